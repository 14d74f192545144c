//! Types for torrent client operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during torrent client operations.
#[derive(Debug, Clone, Error)]
pub enum TorrentClientError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Torrent not found: {0}")]
    TorrentNotFound(String),

    #[error("Torrent already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid torrent data: {0}")]
    InvalidTorrent(String),

    /// The client refused a rename because the target is taken or invalid.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Request timeout")]
    Timeout,
}

impl TorrentClientError {
    /// Transport-level failures are worth another attempt; semantic ones are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed(_) | Self::ApiError(_) | Self::Timeout
        )
    }
}

/// State of a torrent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TorrentState {
    /// Fetching metadata for a URL or magnet add.
    Metadata,
    Downloading,
    Seeding,
    Paused,
    /// Checking file integrity.
    Checking,
    Queued,
    /// No peers.
    Stalled,
    Error,
    Unknown,
}

impl TorrentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TorrentState::Metadata => "metadata",
            TorrentState::Downloading => "downloading",
            TorrentState::Seeding => "seeding",
            TorrentState::Paused => "paused",
            TorrentState::Checking => "checking",
            TorrentState::Queued => "queued",
            TorrentState::Stalled => "stalled",
            TorrentState::Error => "error",
            TorrentState::Unknown => "unknown",
        }
    }
}

/// Snapshot of a torrent inside the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TorrentInfo {
    /// Info hash (lowercase hex).
    pub hash: String,
    /// Display name.
    pub name: String,
    pub state: TorrentState,
    /// Download progress (0.0 - 1.0).
    pub progress: f64,
    pub size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub added_at: Option<DateTime<Utc>>,
}

/// Where the torrent comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TorrentSource {
    /// Link to a `.torrent` file the client downloads itself.
    Url(String),
    Magnet(String),
    /// Raw `.torrent` bytes.
    File {
        data: Vec<u8>,
        filename: Option<String>,
    },
}

/// Request to add a new torrent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddTorrentRequest {
    pub source: TorrentSource,
    /// Known info hash, used to address the torrent once added.
    pub info_hash: Option<String>,
    pub download_path: Option<String>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub paused: bool,
}

impl AddTorrentRequest {
    fn from_source(source: TorrentSource) -> Self {
        Self {
            source,
            info_hash: None,
            download_path: None,
            category: None,
            tags: Vec::new(),
            paused: false,
        }
    }

    pub fn url(url: impl Into<String>) -> Self {
        Self::from_source(TorrentSource::Url(url.into()))
    }

    pub fn magnet(uri: impl Into<String>) -> Self {
        Self::from_source(TorrentSource::Magnet(uri.into()))
    }

    pub fn torrent_file(data: Vec<u8>) -> Self {
        Self::from_source(TorrentSource::File {
            data,
            filename: None,
        })
    }

    /// Picks the source kind from the link: `magnet:` URIs stay magnets.
    pub fn from_link(link: impl Into<String>) -> Self {
        let link = link.into();
        if link.starts_with("magnet:") {
            Self::magnet(link)
        } else {
            Self::url(link)
        }
    }

    pub fn with_info_hash(mut self, hash: impl Into<String>) -> Self {
        self.info_hash = Some(hash.into().to_lowercase());
        self
    }

    pub fn with_download_path(mut self, path: impl Into<String>) -> Self {
        self.download_path = Some(path.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        let category = category.into();
        self.category = (!category.is_empty()).then_some(category);
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags
            .into_iter()
            .map(Into::into)
            .filter(|t: &String| !t.is_empty())
            .collect();
        self
    }

    pub fn with_paused(mut self, paused: bool) -> Self {
        self.paused = paused;
        self
    }
}

/// Result of adding a torrent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddTorrentResult {
    /// Info hash of the added torrent.
    pub hash: String,
    /// Name of the torrent, when already known.
    pub name: Option<String>,
}

/// Torrent client backend.
///
/// File paths are relative to the torrent's save path and use `/`.
#[async_trait]
pub trait TorrentClient: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Adds a torrent. Fails with [`TorrentClientError::AlreadyExists`] when
    /// the client already has it.
    async fn add_torrent(
        &self,
        request: AddTorrentRequest,
    ) -> Result<AddTorrentResult, TorrentClientError>;

    async fn get_torrent(&self, hash: &str) -> Result<TorrentInfo, TorrentClientError>;

    async fn get_state(&self, hash: &str) -> Result<TorrentState, TorrentClientError> {
        Ok(self.get_torrent(hash).await?.state)
    }

    /// Files of the torrent. Empty while metadata is still being fetched.
    async fn list_files(&self, hash: &str) -> Result<Vec<String>, TorrentClientError>;

    /// Renames one file inside the torrent; may move it to another folder.
    async fn rename_file(
        &self,
        hash: &str,
        old_path: &str,
        new_path: &str,
    ) -> Result<(), TorrentClientError>;

    /// Changes the display name of the torrent.
    async fn rename_torrent(&self, hash: &str, name: &str) -> Result<(), TorrentClientError>;

    /// Removes a torrent, deleting its data only when `delete_files` is set.
    async fn remove_torrent(
        &self,
        hash: &str,
        delete_files: bool,
    ) -> Result<(), TorrentClientError>;

    async fn resume_torrent(&self, hash: &str) -> Result<(), TorrentClientError>;

    /// Re-verifies the torrent data against the files on disk.
    async fn recheck_torrent(&self, hash: &str) -> Result<(), TorrentClientError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_torrent_state_serialization() {
        assert_eq!(
            serde_json::to_string(&TorrentState::Downloading).unwrap(),
            "\"downloading\""
        );
        assert_eq!(TorrentState::Metadata.as_str(), "metadata");
    }

    #[test]
    fn test_add_request_builder() {
        let req = AddTorrentRequest::url("https://tracker/download.php?id=1")
            .with_info_hash("ABCDEF")
            .with_download_path("/media/anime")
            .with_category("anime")
            .with_tags(["toloka", ""])
            .with_paused(true);

        assert_eq!(
            req.source,
            TorrentSource::Url("https://tracker/download.php?id=1".to_string())
        );
        assert_eq!(req.info_hash.as_deref(), Some("abcdef"));
        assert_eq!(req.download_path.as_deref(), Some("/media/anime"));
        assert_eq!(req.category.as_deref(), Some("anime"));
        assert_eq!(req.tags, vec!["toloka".to_string()]);
        assert!(req.paused);
    }

    #[test]
    fn test_empty_category_is_none() {
        let req = AddTorrentRequest::url("u").with_category("");
        assert_eq!(req.category, None);
    }

    #[test]
    fn test_from_link_detects_magnets() {
        assert!(matches!(
            AddTorrentRequest::from_link("magnet:?xt=urn:btih:abc").source,
            TorrentSource::Magnet(_)
        ));
        assert!(matches!(
            AddTorrentRequest::from_link("https://x/y.torrent").source,
            TorrentSource::Url(_)
        ));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(TorrentClientError::Timeout.is_retryable());
        assert!(TorrentClientError::ApiError("HTTP 502".into()).is_retryable());
        assert!(!TorrentClientError::AlreadyExists("h".into()).is_retryable());
        assert!(!TorrentClientError::Conflict("taken".into()).is_retryable());
        assert!(!TorrentClientError::AuthenticationFailed("no".into()).is_retryable());
    }
}
