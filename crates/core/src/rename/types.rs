//! Types for the rename engine.

use std::path::{Path, PathBuf};

use serde::Serialize;

/// What happens on disk for one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FsAction {
    /// Move the source to the target if the source is on disk at apply time.
    Move,
    /// Target already holds this episode; keep it and leave the source alone.
    KeepExisting,
    /// Target holds a file outside the batch and the operator agreed to
    /// replace it. Backed up and replaced when the source is on disk;
    /// otherwise the client takes the target over and rewrites it.
    Overwrite,
}

/// One file of the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRename {
    /// Current path inside the torrent.
    pub source: String,
    /// Canonical path inside the torrent: `{folder}/{file}`.
    pub target: String,
    pub episode: u32,
    pub fs_action: FsAction,
}

/// A validated set of renames for one torrent.
#[derive(Debug, Clone, Serialize)]
pub struct RenameBatch {
    pub hash: String,
    /// Save path of the torrent; client paths resolve against it.
    pub download_dir: PathBuf,
    /// Canonical season folder.
    pub folder: String,
    /// Top folder the source files live in, if any.
    pub old_root: Option<String>,
    /// Display name the torrent gets after the batch.
    pub torrent_name: String,
    /// Files in application order.
    pub files: Vec<FileRename>,
}

impl RenameBatch {
    pub fn fs_path(&self, client_path: &str) -> PathBuf {
        fs_path(&self.download_dir, client_path)
    }

    /// Targets that would replace a file outside the batch.
    pub fn overwrites(&self) -> Vec<PathBuf> {
        self.files
            .iter()
            .filter(|f| f.fs_action == FsAction::Overwrite)
            .map(|f| self.fs_path(&f.target))
            .collect()
    }

    /// Targets a partial season already has, kept as they are.
    pub fn adopted(&self) -> usize {
        self.files
            .iter()
            .filter(|f| f.fs_action == FsAction::KeepExisting)
            .count()
    }

    /// Episodes present in the batch.
    pub fn episodes(&self) -> Vec<u32> {
        self.files.iter().map(|f| f.episode).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Joins a `/`-separated client path onto a directory.
pub fn fs_path(root: &Path, client_path: &str) -> PathBuf {
    client_path
        .split('/')
        .filter(|c| !c.is_empty())
        .fold(root.to_path_buf(), |acc, c| acc.join(c))
}

/// A single applied step, recorded so it can be reverted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalEntry {
    ClientRename {
        hash: String,
        from: String,
        to: String,
    },
    FsMove {
        from: PathBuf,
        to: PathBuf,
    },
    CreatedDir(PathBuf),
    /// A displaced target moved aside; restored on rollback, deleted on commit.
    Backup {
        original: PathBuf,
        backup: PathBuf,
    },
    TorrentRenamed {
        hash: String,
        from: String,
        to: String,
    },
}

impl JournalEntry {
    pub fn describe(&self) -> String {
        match self {
            Self::ClientRename { from, to, .. } => format!("client rename '{}' -> '{}'", from, to),
            Self::FsMove { from, to } => {
                format!("move {} -> {}", from.display(), to.display())
            }
            Self::CreatedDir(dir) => format!("create dir {}", dir.display()),
            Self::Backup { original, backup } => {
                format!("backup {} -> {}", original.display(), backup.display())
            }
            Self::TorrentRenamed { from, to, .. } => {
                format!("torrent rename '{}' -> '{}'", from, to)
            }
        }
    }
}

/// Ordered record of applied steps.
#[derive(Debug, Clone, Default)]
pub struct RenameJournal {
    entries: Vec<JournalEntry>,
}

impl RenameJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, entry: JournalEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn take(&mut self) -> Vec<JournalEntry> {
        std::mem::take(&mut self.entries)
    }
}

/// Counters for a committed batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AppliedBatch {
    pub client_renames: usize,
    pub fs_moves: usize,
    pub adopted: usize,
    pub overwritten: usize,
    pub torrent_renamed: bool,
    pub old_folder_removed: bool,
    /// Cleanup steps that failed after commit.
    pub warnings: Vec<String>,
}

impl AppliedBatch {
    /// Number of mutations performed.
    pub fn operations(&self) -> usize {
        self.client_renames
            + self.fs_moves
            + self.overwritten
            + usize::from(self.torrent_renamed)
            + usize::from(self.old_folder_removed)
    }
}
