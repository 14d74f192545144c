//! Error types for the rename engine.

use std::path::PathBuf;
use thiserror::Error;

use crate::naming::NamingError;
use crate::torrent_client::TorrentClientError;

/// Errors raised while planning or applying a rename batch.
#[derive(Debug, Error)]
pub enum RenameError {
    /// The torrent is not a flat single-season layout.
    #[error("Unsupported layout: {0}")]
    UnsupportedLayout(String),

    /// A file name did not yield an episode number.
    #[error("Cannot name '{path}': {source}")]
    Naming {
        path: String,
        #[source]
        source: NamingError,
    },

    /// Two files map to one target, or a target is taken.
    #[error("Rename conflict: {0}")]
    Conflict(String),

    /// A client call failed.
    #[error("Client {step} failed: {source}")]
    Client {
        step: String,
        #[source]
        source: TorrentClientError,
    },

    /// A filesystem step failed.
    #[error("Filesystem error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Rollback after a failure left some steps applied.
    #[error("{cause}; rollback left {} step(s) applied: {}", .unreverted.len(), .unreverted.join("; "))]
    PartialRollback {
        cause: Box<RenameError>,
        unreverted: Vec<String>,
    },
}

impl RenameError {
    pub(crate) fn client(step: impl Into<String>, source: TorrentClientError) -> Self {
        Self::Client {
            step: step.into(),
            source,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
