//! Orchestrator configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::config::{ApplicationConfig, Config, RetryConfig};
use crate::retry::RetryPolicy;

/// Runtime settings for the rename orchestrator, derived from [`Config`].
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub registry_path: PathBuf,
    /// Used when an add request names no download dir.
    pub default_download_dir: String,
    /// Used when an add request names no meta.
    pub default_meta: String,
    pub enable_dot_spacing_in_file_name: bool,
    /// Pause after adding a torrent before querying it.
    pub client_wait: Duration,
    pub metadata_poll_interval: Duration,
    pub metadata_timeout: Duration,
    pub category: String,
    pub tags: Vec<String>,
    pub retry: RetryPolicy,
}

impl OrchestratorConfig {
    pub fn from_config(config: &Config) -> Self {
        Self::from_sections(&config.application, &config.retry)
    }

    fn from_sections(app: &ApplicationConfig, retry: &RetryConfig) -> Self {
        Self {
            registry_path: app.registry_path.clone(),
            default_download_dir: app.default_download_dir.clone(),
            default_meta: app.default_meta.clone(),
            enable_dot_spacing_in_file_name: app.enable_dot_spacing_in_file_name,
            client_wait: Duration::from_secs(app.client_wait_time_secs),
            metadata_poll_interval: Duration::from_millis(app.metadata_poll_interval_ms),
            metadata_timeout: Duration::from_secs(app.metadata_timeout_secs),
            category: app.category.clone(),
            tags: app.tags.clone(),
            retry: RetryPolicy::from(retry),
        }
    }

    /// Settings for tests: no waiting, no retries.
    pub fn immediate(registry_path: impl Into<PathBuf>) -> Self {
        Self {
            registry_path: registry_path.into(),
            client_wait: Duration::ZERO,
            metadata_poll_interval: Duration::from_millis(1),
            metadata_timeout: Duration::from_millis(200),
            retry: RetryPolicy::no_retry(),
            ..Self::default()
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::from_sections(&ApplicationConfig::default(), &RetryConfig::default())
    }
}
