//! Error types for the title registry.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading, mutating or persisting the registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Reading or writing the registry file failed.
    #[error("Registry I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The registry file is not valid TOML.
    #[error("Failed to parse registry {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    /// An entry could not be turned back into TOML.
    #[error("Failed to serialize title '{codename}': {reason}")]
    Serialize { codename: String, reason: String },

    /// The stored entry exists but does not describe a usable title.
    #[error("Title '{codename}' is malformed: {reason}")]
    InvalidEntry { codename: String, reason: String },

    /// No entry with this codename.
    #[error("Title '{0}' not found")]
    NotFound(String),

    /// Codename already taken.
    #[error("Title '{0}' is already tracked")]
    Duplicate(String),

    /// Another run holds the lock file.
    #[error("Registry is locked by another run (holder: {holder}); remove {path} if no run is active")]
    Locked { path: PathBuf, holder: String },
}

impl RegistryError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
