//! JSON-over-HTTP tracker adapter.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::debug;

use crate::config::TrackerConfig;

use super::{TorrentObservation, Tracker, TrackerError};

/// Reads release snapshots from `GET {url}/api/releases/{guid}`.
///
/// Relative `torrent_url` values are resolved against the tracker URL.
pub struct HttpTracker {
    client: Client,
    config: TrackerConfig,
}

impl HttpTracker {
    pub fn new(config: TrackerConfig) -> Result<Self, TrackerError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| TrackerError::ConnectionFailed(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn base_url(&self) -> &str {
        self.config.url.trim_end_matches('/')
    }

    fn release_url(&self, guid: &str) -> String {
        format!(
            "{}/api/releases/{}",
            self.base_url(),
            urlencoding::encode(guid)
        )
    }

    fn absolute_url(&self, link: &str) -> String {
        if link.contains("://") || link.starts_with("magnet:") {
            link.to_string()
        } else {
            format!("{}/{}", self.base_url(), link.trim_start_matches('/'))
        }
    }
}

#[async_trait]
impl Tracker for HttpTracker {
    fn name(&self) -> &str {
        "http"
    }

    async fn observe(&self, guid: &str) -> Result<TorrentObservation, TrackerError> {
        let url = self.release_url(guid);
        debug!(guid = guid, "Fetching release from tracker");

        let mut request = self.client.get(&url);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                TrackerError::Timeout
            } else if e.is_connect() {
                TrackerError::ConnectionFailed(e.to_string())
            } else {
                TrackerError::ApiError(e.to_string())
            }
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(TrackerError::NotFound(guid.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TrackerError::ApiError(format!(
                "HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let mut observation: TorrentObservation = response
            .json()
            .await
            .map_err(|e| TrackerError::InvalidResponse(e.to_string()))?;

        if observation.hash.trim().is_empty() {
            return Err(TrackerError::InvalidResponse(format!(
                "release {} has no info hash",
                guid
            )));
        }

        observation.hash = observation.hash.trim().to_lowercase();
        observation.torrent_url = self.absolute_url(&observation.torrent_url);
        if observation.guid.is_empty() {
            observation.guid = guid.to_string();
        }

        Ok(observation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker(url: &str) -> HttpTracker {
        HttpTracker::new(TrackerConfig {
            url: url.to_string(),
            timeout_secs: 5,
            api_key: None,
        })
        .unwrap()
    }

    #[test]
    fn test_release_url_encodes_guid() {
        let t = tracker("https://toloka.example/");
        assert_eq!(
            t.release_url("t675888"),
            "https://toloka.example/api/releases/t675888"
        );
        assert_eq!(
            t.release_url("a b"),
            "https://toloka.example/api/releases/a%20b"
        );
    }

    #[test]
    fn test_absolute_url() {
        let t = tracker("https://toloka.example");
        assert_eq!(
            t.absolute_url("download.php?id=42"),
            "https://toloka.example/download.php?id=42"
        );
        assert_eq!(
            t.absolute_url("/download.php?id=42"),
            "https://toloka.example/download.php?id=42"
        );
        assert_eq!(
            t.absolute_url("https://cdn.example/x.torrent"),
            "https://cdn.example/x.torrent"
        );
        assert_eq!(
            t.absolute_url("magnet:?xt=urn:btih:abc"),
            "magnet:?xt=urn:btih:abc"
        );
    }

    #[tokio::test]
    async fn test_unreachable_tracker_is_retryable() {
        let t = tracker("http://127.0.0.1:9");
        let err = t.observe("t1").await.unwrap_err();
        assert!(err.is_retryable(), "unexpected error: {err:?}");
    }
}
