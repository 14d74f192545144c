//! Types for the rename orchestrator.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::detector::UpdateVerdict;
use crate::naming::NamingError;
use crate::registry::RegistryError;
use crate::rename::{AppliedBatch, RenameError};
use crate::torrent_client::TorrentClientError;
use crate::tracker::TrackerError;

/// Where a title is in its lifecycle.
///
/// ```text
/// Discovered -> Added -> Downloading -> Renaming -> Tracked
/// Tracked -> Updating -> Renaming -> Tracked
/// ```
///
/// Any phase except `Failed` itself can move to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TitlePhase {
    Discovered,
    Added,
    Downloading,
    Renaming,
    Tracked,
    Updating,
    Failed,
}

impl TitlePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            TitlePhase::Discovered => "discovered",
            TitlePhase::Added => "added",
            TitlePhase::Downloading => "downloading",
            TitlePhase::Renaming => "renaming",
            TitlePhase::Tracked => "tracked",
            TitlePhase::Updating => "updating",
            TitlePhase::Failed => "failed",
        }
    }

    pub fn can_advance_to(&self, next: TitlePhase) -> bool {
        use TitlePhase::*;
        matches!(
            (self, next),
            (Discovered, Added)
                | (Added, Downloading)
                | (Downloading, Renaming)
                | (Renaming, Tracked)
                | (Tracked, Updating)
                | (Updating, Renaming)
        ) || (next == Failed && *self != Failed)
    }

    /// Returns `next` if the transition is allowed.
    pub fn advance(self, next: TitlePhase) -> Result<TitlePhase, PhaseError> {
        if self.can_advance_to(next) {
            Ok(next)
        } else {
            Err(PhaseError {
                from: self,
                to: next,
            })
        }
    }
}

impl fmt::Display for TitlePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected phase transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid phase transition: {from} -> {to}")]
pub struct PhaseError {
    pub from: TitlePhase,
    pub to: TitlePhase,
}

/// Why a title failed.
#[derive(Debug, Error)]
pub enum TitleError {
    /// Bad title settings or an unreadable registry entry.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("tracker error: {0}")]
    Tracker(#[from] TrackerError),

    #[error("torrent client error ({step}): {source}")]
    Client {
        step: String,
        #[source]
        source: TorrentClientError,
    },

    #[error("cannot name '{path}': {source}")]
    Naming {
        path: String,
        #[source]
        source: NamingError,
    },

    #[error("rename conflict: {0}")]
    RenameConflict(String),

    /// Rollback could not undo everything; manual repair needed.
    #[error("{cause}; not reverted: {}", .unreverted.join("; "))]
    PartialRollback {
        cause: String,
        unreverted: Vec<String>,
    },

    #[error("unsupported layout: {0}")]
    UnsupportedLayout(String),

    #[error("filesystem error at {}: {source}", .path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no metadata for torrent {hash} after {waited_secs}s")]
    MetadataTimeout { hash: String, waited_secs: u64 },

    #[error("registry error: {0}")]
    Registry(RegistryError),

    #[error("title already tracked: {0}")]
    AlreadyTracked(String),

    /// The operator declined a required answer.
    #[error("cancelled: {0}")]
    Cancelled(String),

    #[error(transparent)]
    Phase(#[from] PhaseError),
}

impl TitleError {
    pub(crate) fn client(step: impl Into<String>, source: TorrentClientError) -> Self {
        Self::Client {
            step: step.into(),
            source,
        }
    }

    /// Short machine-readable category.
    pub fn kind(&self) -> &'static str {
        match self {
            TitleError::Config(_) => "config",
            TitleError::Tracker(_) => "tracker",
            TitleError::Client { .. } => "client",
            TitleError::Naming { .. } => "naming",
            TitleError::RenameConflict(_) => "rename_conflict",
            TitleError::PartialRollback { .. } => "partial_rollback",
            TitleError::UnsupportedLayout(_) => "unsupported_layout",
            TitleError::Filesystem { .. } => "filesystem",
            TitleError::MetadataTimeout { .. } => "metadata_timeout",
            TitleError::Registry(_) => "registry",
            TitleError::AlreadyTracked(_) => "already_tracked",
            TitleError::Cancelled(_) => "cancelled",
            TitleError::Phase(_) => "phase",
        }
    }
}

impl From<RegistryError> for TitleError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::InvalidEntry { .. } => TitleError::Config(err.to_string()),
            other => TitleError::Registry(other),
        }
    }
}

impl From<RenameError> for TitleError {
    fn from(err: RenameError) -> Self {
        match err {
            RenameError::UnsupportedLayout(reason) => TitleError::UnsupportedLayout(reason),
            RenameError::Naming { path, source } => TitleError::Naming { path, source },
            RenameError::Conflict(reason) => TitleError::RenameConflict(reason),
            RenameError::Client { step, source } => TitleError::Client { step, source },
            RenameError::Io { path, source } => TitleError::Filesystem { path, source },
            RenameError::PartialRollback { cause, unreverted } => TitleError::PartialRollback {
                cause: cause.to_string(),
                unreverted,
            },
        }
    }
}

/// Parameters of a new title.
///
/// Unset fields are filled from the tracker observation, the application
/// config or the operator prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddRequest {
    /// Tracker release URL or bare guid.
    pub url: String,
    pub season_number: u32,
    /// 1-based episode token position; prompted for when absent.
    pub episode_index: Option<usize>,
    /// Episode offset. When absent it is prompted for if the index was
    /// prompted too, and 0 otherwise.
    pub adjusted_episode_number: Option<i64>,
    pub title: Option<String>,
    pub codename: Option<String>,
    pub download_dir: Option<String>,
    pub release_group: Option<String>,
    pub meta: Option<String>,
    pub is_partial_season: bool,
}

impl AddRequest {
    pub fn new(url: impl Into<String>, season_number: u32) -> Self {
        Self {
            url: url.into(),
            season_number,
            ..Default::default()
        }
    }

    pub fn with_episode_index(mut self, index: usize) -> Self {
        self.episode_index = Some(index);
        self
    }

    pub fn with_adjustment(mut self, adjustment: i64) -> Self {
        self.adjusted_episode_number = Some(adjustment);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_codename(mut self, codename: impl Into<String>) -> Self {
        self.codename = Some(codename.into());
        self
    }

    pub fn with_download_dir(mut self, dir: impl Into<String>) -> Self {
        self.download_dir = Some(dir.into());
        self
    }

    pub fn with_release_group(mut self, group: impl Into<String>) -> Self {
        self.release_group = Some(group.into());
        self
    }

    pub fn with_meta(mut self, meta: impl Into<String>) -> Self {
        self.meta = Some(meta.into());
        self
    }

    pub fn partial_season(mut self, partial: bool) -> Self {
        self.is_partial_season = partial;
        self
    }
}

/// Result of processing one title.
#[derive(Debug)]
pub struct TitleOutcome {
    pub codename: String,
    pub phase: TitlePhase,
    pub verdict: Option<UpdateVerdict>,
    pub applied: Option<AppliedBatch>,
    /// Best-effort steps that failed after the batch committed.
    pub warnings: Vec<String>,
    pub error: Option<TitleError>,
}

impl TitleOutcome {
    pub fn new(codename: impl Into<String>, phase: TitlePhase) -> Self {
        Self {
            codename: codename.into(),
            phase,
            verdict: None,
            applied: None,
            warnings: Vec::new(),
            error: None,
        }
    }

    pub(crate) fn advance(&mut self, next: TitlePhase) -> Result<(), TitleError> {
        self.phase = self.phase.advance(next)?;
        Ok(())
    }

    pub(crate) fn fail(mut self, error: TitleError) -> Self {
        self.phase = TitlePhase::Failed;
        self.error = Some(error);
        self
    }

    pub fn is_failed(&self) -> bool {
        self.phase == TitlePhase::Failed
    }

    /// Whether the run renamed or moved anything for this title.
    pub fn changed(&self) -> bool {
        self.applied
            .as_ref()
            .map(|a| a.operations() > 0)
            .unwrap_or(false)
    }
}

/// Outcomes of a multi-title run.
#[derive(Debug, Default)]
pub struct RunReport {
    pub outcomes: Vec<TitleOutcome>,
}

impl RunReport {
    pub fn push(&mut self, outcome: TitleOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn failed(&self) -> impl Iterator<Item = &TitleOutcome> {
        self.outcomes.iter().filter(|o| o.is_failed())
    }

    pub fn failed_count(&self) -> usize {
        self.failed().count()
    }

    pub fn updated_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| !o.is_failed() && o.verdict.as_ref().is_some_and(|v| v.is_changed()))
            .count()
    }

    /// 0 when no title failed, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.failed_count() == 0 {
            0
        } else {
            1
        }
    }
}
