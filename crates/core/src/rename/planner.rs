//! Builds validated rename batches from a torrent file listing.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use tracing::debug;

use crate::naming::{EpisodeNumberResolver, NameComposer};
use crate::registry::TitleEntry;

use super::error::RenameError;
use super::types::{fs_path, FileRename, FsAction, RenameBatch};

/// Canonical name of one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    pub source: String,
    pub target: String,
    pub episode: u32,
}

impl ResolvedFile {
    pub fn is_canonical(&self) -> bool {
        self.source == self.target
    }
}

/// Naming result for a whole listing, before any disk inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedNames {
    pub folder: String,
    pub old_root: Option<String>,
    pub torrent_name: String,
    pub files: Vec<ResolvedFile>,
}

/// Turns file listings into rename batches.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenamePlanner {
    composer: NameComposer,
}

impl RenamePlanner {
    pub fn new(composer: NameComposer) -> Self {
        Self { composer }
    }

    pub fn composer(&self) -> &NameComposer {
        &self.composer
    }

    /// Resolves every file's canonical path without touching disk.
    ///
    /// Fails on non-flat layouts, unresolvable episode numbers and duplicate
    /// targets.
    pub fn resolve(
        &self,
        entry: &TitleEntry,
        files: &[String],
    ) -> Result<ResolvedNames, RenameError> {
        let old_root = detect_layout(files)?;
        let resolver =
            EpisodeNumberResolver::new(entry.episode_index, entry.adjusted_episode_number);
        let canonical_resolver =
            EpisodeNumberResolver::new(NameComposer::episode_index_in_file_name(entry), 0);
        let folder = self.composer.folder_name(entry);

        let mut resolved = Vec::with_capacity(files.len());
        let mut targets: HashMap<String, String> = HashMap::new();

        for source in files {
            // Already-renamed files no longer follow the release's numbering.
            let episode = match self.canonical_episode(entry, &folder, &canonical_resolver, source) {
                Some(episode) => episode,
                None => resolver.resolve(source).map_err(|e| RenameError::Naming {
                    path: source.clone(),
                    source: e,
                })?,
            };
            let target = format!(
                "{}/{}",
                folder,
                self.composer.file_name(entry, episode, source)
            );

            if let Some(other) = targets.insert(target.clone(), source.clone()) {
                return Err(RenameError::Conflict(format!(
                    "'{}' and '{}' both map to '{}'",
                    other, source, target
                )));
            }

            resolved.push(ResolvedFile {
                source: source.clone(),
                target,
                episode,
            });
        }

        let episodes: Vec<u32> = resolved.iter().map(|f| f.episode).collect();
        let torrent_name = self.composer.torrent_name(entry, &episodes);

        Ok(ResolvedNames {
            folder,
            old_root,
            torrent_name,
            files: resolved,
        })
    }

    /// Episode of `source` if it is exactly the canonical path for that episode.
    fn canonical_episode(
        &self,
        entry: &TitleEntry,
        folder: &str,
        resolver: &EpisodeNumberResolver,
        source: &str,
    ) -> Option<u32> {
        let episode = resolver.resolve(source).ok()?;
        let canonical = format!(
            "{}/{}",
            folder,
            self.composer.file_name(entry, episode, source)
        );
        (canonical == source).then_some(episode)
    }

    /// Builds the batch for torrent `hash` saved under `entry.download_dir`.
    ///
    /// Already-canonical files are dropped. Occupied targets become
    /// [`FsAction::KeepExisting`] for partial seasons and
    /// [`FsAction::Overwrite`] otherwise, whether or not the source has been
    /// downloaded yet. Overwrites need confirmation.
    pub fn plan(
        &self,
        entry: &TitleEntry,
        hash: &str,
        files: &[String],
    ) -> Result<RenameBatch, RenameError> {
        let names = self.resolve(entry, files)?;
        let download_dir = PathBuf::from(&entry.download_dir);

        let pending: Vec<ResolvedFile> = names
            .files
            .into_iter()
            .filter(|f| !f.is_canonical())
            .collect();
        let sources: HashSet<&str> = pending.iter().map(|f| f.source.as_str()).collect();

        let mut planned = Vec::with_capacity(pending.len());
        for file in &pending {
            let target_occupied = fs_path(&download_dir, &file.target).exists()
                && !sources.contains(file.target.as_str());

            let fs_action = if !target_occupied {
                FsAction::Move
            } else if entry.is_partial_season {
                FsAction::KeepExisting
            } else {
                FsAction::Overwrite
            };

            planned.push(FileRename {
                source: file.source.clone(),
                target: file.target.clone(),
                episode: file.episode,
                fs_action,
            });
        }

        let files = order_for_chains(planned)?;

        debug!(
            hash = hash,
            folder = %names.folder,
            files = files.len(),
            "Rename batch planned"
        );

        Ok(RenameBatch {
            hash: hash.to_string(),
            download_dir,
            folder: names.folder,
            old_root: names.old_root,
            torrent_name: names.torrent_name,
            files,
        })
    }
}

/// Returns the shared top folder of a flat listing (`None` for root files).
fn detect_layout(files: &[String]) -> Result<Option<String>, RenameError> {
    let mut root: Option<Option<&str>> = None;

    for path in files {
        let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
        let folder = match parts.as_slice() {
            [_] => None,
            [folder, _] => Some(*folder),
            [] => {
                return Err(RenameError::UnsupportedLayout(
                    "empty file path in listing".to_string(),
                ))
            }
            _ => {
                return Err(RenameError::UnsupportedLayout(format!(
                    "nested directories are not supported: '{}'",
                    path
                )))
            }
        };

        match root {
            None => root = Some(folder),
            Some(existing) if existing == folder => {}
            Some(_) => {
                return Err(RenameError::UnsupportedLayout(
                    "files are spread over several folders".to_string(),
                ))
            }
        }
    }

    match root {
        Some(folder) => Ok(folder.map(str::to_string)),
        None => Err(RenameError::UnsupportedLayout(
            "torrent has no files".to_string(),
        )),
    }
}

/// Orders renames so no file lands on a path another rename still has to vacate.
fn order_for_chains(mut pending: Vec<FileRename>) -> Result<Vec<FileRename>, RenameError> {
    let mut ordered = Vec::with_capacity(pending.len());

    while !pending.is_empty() {
        let ready = pending.iter().position(|candidate| {
            !pending
                .iter()
                .any(|other| other.source == candidate.target)
        });

        match ready {
            Some(idx) => ordered.push(pending.remove(idx)),
            None => {
                return Err(RenameError::Conflict(format!(
                    "renames form a cycle starting at '{}'",
                    pending[0].source
                )))
            }
        }
    }

    Ok(ordered)
}
