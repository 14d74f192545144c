//! Mock tracker for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::tracker::{guid_from_url, TorrentObservation, Tracker, TrackerError};

/// Mock implementation of the Tracker trait.
///
/// Serves configured observations by guid. URLs are reduced to their guid
/// the same way the HTTP tracker does it.
///
/// # Example
///
/// ```rust,ignore
/// let tracker = MockTracker::new();
/// tracker.set_observation(fixtures::observation("t1", "abc", &["Show - 01.mkv"])).await;
///
/// let obs = tracker.observe("https://toloka.to/t1").await?;
/// assert_eq!(obs.hash, "abc");
/// ```
#[derive(Debug, Default)]
pub struct MockTracker {
    observations: Arc<RwLock<HashMap<String, TorrentObservation>>>,
    /// Guids that fail with the given error on every call.
    failures: Arc<RwLock<HashMap<String, TrackerError>>>,
    /// Recorded observe calls (guids).
    calls: Arc<RwLock<Vec<String>>>,
}

impl MockTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish (or replace) the observation for its guid.
    pub async fn set_observation(&self, observation: TorrentObservation) {
        self.observations
            .write()
            .await
            .insert(observation.guid.clone(), observation);
    }

    pub async fn fail_guid(&self, guid: &str, error: TrackerError) {
        self.failures.write().await.insert(guid.to_string(), error);
    }

    /// Guids observed so far, in call order.
    pub async fn calls(&self) -> Vec<String> {
        self.calls.read().await.clone()
    }
}

#[async_trait]
impl Tracker for MockTracker {
    fn name(&self) -> &str {
        "mock"
    }

    async fn observe(&self, guid: &str) -> Result<TorrentObservation, TrackerError> {
        let guid = guid_from_url(guid);
        self.calls.write().await.push(guid.clone());

        if let Some(err) = self.failures.read().await.get(&guid) {
            return Err(err.clone());
        }

        self.observations
            .read()
            .await
            .get(&guid)
            .cloned()
            .ok_or(TrackerError::NotFound(guid))
    }
}
