//! Types for tracker metadata retrieval.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while fetching release metadata.
#[derive(Debug, Clone, Error)]
pub enum TrackerError {
    #[error("Tracker connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Release not found: {0}")]
    NotFound(String),

    #[error("Invalid tracker response: {0}")]
    InvalidResponse(String),

    #[error("Tracker API error: {0}")]
    ApiError(String),

    #[error("Request timeout")]
    Timeout,
}

impl TrackerError {
    /// Whether a later attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed(_) | Self::ApiError(_) | Self::Timeout
        )
    }
}

/// Snapshot of a release as currently published on the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TorrentObservation {
    /// Tracker identifier of the release thread.
    pub guid: String,
    /// Info hash of the published torrent.
    pub hash: String,
    pub publish_date: DateTime<Utc>,
    /// Tracker title, usually `Native name / English name (year)`.
    #[serde(default)]
    pub name: String,
    /// Uploader; the default release group for new titles.
    #[serde(default)]
    pub author: String,
    /// Link handed to the torrent client.
    pub torrent_url: String,
    /// Paths inside the torrent, relative to its root.
    #[serde(default)]
    pub files: Vec<String>,
}

/// Source of release observations.
#[async_trait]
pub trait Tracker: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Fetches the current state of the release identified by `guid`.
    async fn observe(&self, guid: &str) -> Result<TorrentObservation, TrackerError>;
}

/// Extracts the release guid from a tracker URL (`https://host/t12345` -> `t12345`).
///
/// Values without a scheme are returned trimmed of slashes and quotes.
pub fn guid_from_url(url: &str) -> String {
    let trimmed = url.trim().trim_matches('"');
    let without_query = trimmed.split(['?', '#']).next().unwrap_or(trimmed);
    if without_query.contains("://") {
        without_query
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(without_query)
            .to_string()
    } else {
        without_query.trim_matches('/').to_string()
    }
}
