//! Error types for episode resolution.

use thiserror::Error;

/// Errors raised while deriving an episode number from a file name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NamingError {
    /// Episode index must be 1-based.
    #[error("Episode index must be at least 1")]
    InvalidIndex,

    /// The file name has fewer numeric tokens than the configured index.
    #[error("'{file_name}' has {found} numeric token(s), episode index is {index}")]
    MissingToken {
        file_name: String,
        index: usize,
        found: usize,
    },

    /// The selected digit run does not fit into an episode number.
    #[error("Number '{token}' in '{file_name}' is too large")]
    Overflow { file_name: String, token: String },

    /// Raw number plus adjustment went below zero.
    #[error("Episode {raw} adjusted by {adjustment} is negative in '{file_name}'")]
    NegativeEpisode {
        file_name: String,
        raw: u64,
        adjustment: i64,
    },
}
