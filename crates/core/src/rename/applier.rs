//! Applies rename batches through the client and the filesystem.
//!
//! Every mutation is journaled before the next one starts. If any step fails
//! the journal is replayed backwards; steps that cannot be reverted are
//! reported in [`RenameError::PartialRollback`]. A staged batch keeps its
//! journal until the caller commits or reverts it.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::retry::RetryPolicy;
use crate::torrent_client::TorrentClient;

use super::error::RenameError;
use super::types::{AppliedBatch, FileRename, FsAction, JournalEntry, RenameBatch, RenameJournal};

/// A batch whose steps are applied but not yet committed.
///
/// Backups and the old folder are still on disk, so it can be reverted with
/// [`RenameApplier::revert`] until [`RenameApplier::commit`] runs.
#[derive(Debug)]
pub struct StagedBatch {
    batch: RenameBatch,
    journal: RenameJournal,
    applied: AppliedBatch,
}

impl StagedBatch {
    pub fn applied(&self) -> &AppliedBatch {
        &self.applied
    }

    pub fn steps(&self) -> usize {
        self.journal.len()
    }
}

/// Executes [`RenameBatch`]es as all-or-nothing units.
pub struct RenameApplier {
    client: Arc<dyn TorrentClient>,
    retry: RetryPolicy,
}

impl RenameApplier {
    pub fn new(client: Arc<dyn TorrentClient>, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }

    /// Applies every step of the batch, or reverts what it did and returns
    /// the cause.
    ///
    /// Overwrites must be confirmed by the caller before this is invoked.
    pub async fn stage(&self, batch: &RenameBatch) -> Result<StagedBatch, RenameError> {
        let mut journal = RenameJournal::new();
        let mut applied = AppliedBatch {
            adopted: batch.adopted(),
            ..Default::default()
        };

        match self.run(batch, &mut journal, &mut applied).await {
            Ok(()) => {
                debug!(hash = %batch.hash, steps = journal.len(), "Rename batch staged");
                Ok(StagedBatch {
                    batch: batch.clone(),
                    journal,
                    applied,
                })
            }
            Err(cause) => {
                warn!(
                    hash = %batch.hash,
                    steps = journal.len(),
                    error = %cause,
                    "Rename batch failed, rolling back"
                );
                let unreverted = self.rollback(&mut journal).await;
                if unreverted.is_empty() {
                    Err(cause)
                } else {
                    Err(RenameError::PartialRollback {
                        cause: Box::new(cause),
                        unreverted,
                    })
                }
            }
        }
    }

    /// Drops backups and the emptied source folder. Failures here are warnings.
    pub async fn commit(&self, staged: StagedBatch) -> AppliedBatch {
        let StagedBatch {
            batch,
            mut journal,
            mut applied,
        } = staged;

        for entry in journal.take() {
            if let JournalEntry::Backup { backup, .. } = entry {
                if let Err(e) = fs::remove_file(&backup).await {
                    applied
                        .warnings
                        .push(format!("could not delete backup {}: {}", backup.display(), e));
                }
            }
        }

        if let Some(old_root) = &batch.old_root {
            if old_root != &batch.folder {
                let dir = batch.fs_path(old_root);
                match remove_if_empty(&dir).await {
                    Ok(removed) => applied.old_folder_removed = removed,
                    Err(e) => applied.warnings.push(format!(
                        "could not remove old folder {}: {}",
                        dir.display(),
                        e
                    )),
                }
            }
        }

        for warning in &applied.warnings {
            warn!(hash = %batch.hash, "{}", warning);
        }
        info!(
            hash = %batch.hash,
            client_renames = applied.client_renames,
            fs_moves = applied.fs_moves,
            adopted = applied.adopted,
            overwritten = applied.overwritten,
            "Rename batch committed"
        );
        applied
    }

    /// Undoes a staged batch. Returns the steps that could not be reverted.
    pub async fn revert(&self, staged: StagedBatch) -> Vec<String> {
        let StagedBatch {
            batch, mut journal, ..
        } = staged;
        info!(hash = %batch.hash, steps = journal.len(), "Reverting staged rename batch");
        self.rollback(&mut journal).await
    }

    async fn run(
        &self,
        batch: &RenameBatch,
        journal: &mut RenameJournal,
        applied: &mut AppliedBatch,
    ) -> Result<(), RenameError> {
        for file in &batch.files {
            self.apply_file(batch, file, journal, applied).await?;
        }

        let current = self
            .retry
            .run("get_torrent", || self.client.get_torrent(&batch.hash))
            .await
            .map_err(|e| RenameError::client("get_torrent", e))?;

        if current.name != batch.torrent_name {
            self.retry
                .run("rename_torrent", || {
                    self.client.rename_torrent(&batch.hash, &batch.torrent_name)
                })
                .await
                .map_err(|e| RenameError::client("rename_torrent", e))?;
            journal.record(JournalEntry::TorrentRenamed {
                hash: batch.hash.clone(),
                from: current.name,
                to: batch.torrent_name.clone(),
            });
            applied.torrent_renamed = true;
        }

        Ok(())
    }

    async fn apply_file(
        &self,
        batch: &RenameBatch,
        file: &FileRename,
        journal: &mut RenameJournal,
        applied: &mut AppliedBatch,
    ) -> Result<(), RenameError> {
        let source = batch.fs_path(&file.source);
        let target = batch.fs_path(&file.target);

        if file.fs_action == FsAction::Overwrite {
            applied.overwritten += 1;
        }
        // Without a source on disk the client adopts the target and rewrites
        // it in place on recheck.
        if file.fs_action == FsAction::Overwrite && target.exists() && source.exists() {
            let backup = backup_path(&target);
            fs::rename(&target, &backup)
                .await
                .map_err(|e| RenameError::io(&target, e))?;
            journal.record(JournalEntry::Backup {
                original: target.clone(),
                backup,
            });
        }

        self.retry
            .run("rename_file", || {
                self.client
                    .rename_file(&batch.hash, &file.source, &file.target)
            })
            .await
            .map_err(|e| RenameError::client(format!("rename of '{}'", file.source), e))?;
        journal.record(JournalEntry::ClientRename {
            hash: batch.hash.clone(),
            from: file.source.clone(),
            to: file.target.clone(),
        });
        applied.client_renames += 1;

        // Clients that move data themselves leave nothing at the source.
        if file.fs_action == FsAction::KeepExisting || !source.exists() {
            return Ok(());
        }

        if target.exists() {
            return Err(RenameError::Conflict(format!(
                "target already exists: {}",
                target.display()
            )));
        }

        ensure_parent_dirs(&target, journal).await?;

        fs::rename(&source, &target)
            .await
            .map_err(|e| RenameError::io(&source, e))?;
        debug!(from = %source.display(), to = %target.display(), "Moved file");
        journal.record(JournalEntry::FsMove {
            from: source,
            to: target,
        });
        applied.fs_moves += 1;

        Ok(())
    }

    /// Reverts journaled steps newest first. Returns the steps left applied.
    async fn rollback(&self, journal: &mut RenameJournal) -> Vec<String> {
        let mut unreverted = Vec::new();
        let mut attempted_dirs: HashSet<PathBuf> = HashSet::new();

        for entry in journal.take().into_iter().rev() {
            let result = match &entry {
                JournalEntry::ClientRename { hash, from, to } => self
                    .retry
                    .run("rename_file", || self.client.rename_file(hash, to, from))
                    .await
                    .map_err(|e| e.to_string()),
                JournalEntry::TorrentRenamed { hash, from, .. } => self
                    .retry
                    .run("rename_torrent", || self.client.rename_torrent(hash, from))
                    .await
                    .map_err(|e| e.to_string()),
                JournalEntry::FsMove { from, to } => {
                    revert_move(to, from).await.map_err(|e| e.to_string())
                }
                JournalEntry::Backup { original, backup } => {
                    revert_move(backup, original).await.map_err(|e| e.to_string())
                }
                JournalEntry::CreatedDir(dir) => {
                    if !attempted_dirs.insert(dir.clone()) {
                        continue;
                    }
                    remove_if_empty(dir)
                        .await
                        .map(|_| ())
                        .map_err(|e| e.to_string())
                }
            };

            match result {
                Ok(()) => debug!(step = %entry.describe(), "Reverted"),
                Err(e) => {
                    warn!(step = %entry.describe(), error = %e, "Failed to revert");
                    unreverted.push(entry.describe());
                }
            }
        }

        unreverted
    }
}

/// Creates missing parent directories, journaling each one.
async fn ensure_parent_dirs(path: &Path, journal: &mut RenameJournal) -> Result<(), RenameError> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.exists() {
        return Ok(());
    }

    let mut missing = Vec::new();
    let mut current = parent;
    while !current.exists() {
        missing.push(current.to_path_buf());
        current = match current.parent() {
            Some(p) => p,
            None => break,
        };
    }

    fs::create_dir_all(parent)
        .await
        .map_err(|e| RenameError::io(parent, e))?;

    // Outermost first, so reverse replay removes children before parents.
    for dir in missing.into_iter().rev() {
        journal.record(JournalEntry::CreatedDir(dir));
    }
    Ok(())
}

async fn revert_move(from: &Path, to: &Path) -> std::io::Result<()> {
    if to.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("{} is occupied", to.display()),
        ));
    }
    fs::rename(from, to).await
}

/// Removes `dir` when it exists and is empty.
async fn remove_if_empty(dir: &Path) -> std::io::Result<bool> {
    if !dir.is_dir() {
        return Ok(false);
    }
    let mut entries = fs::read_dir(dir).await?;
    if entries.next_entry().await?.is_some() {
        return Ok(false);
    }
    fs::remove_dir(dir).await?;
    Ok(true)
}

fn backup_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let suffix = Uuid::new_v4().simple().to_string();
    target.with_file_name(format!(".{}.{}.bak", name, &suffix[..8]))
}
