use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub application: ApplicationConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    pub client: ClientConfig,
    pub tracker: TrackerConfig,
}

/// Application-wide settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApplicationConfig {
    /// TOML file holding tracked titles
    #[serde(default = "default_registry_path")]
    pub registry_path: PathBuf,
    /// Download dir for new titles when none is given
    #[serde(default)]
    pub default_download_dir: String,
    /// Meta tags for new titles when none are given
    #[serde(default)]
    pub default_meta: String,
    #[serde(default)]
    pub enable_dot_spacing_in_file_name: bool,
    /// Pause after adding a torrent before querying it (seconds)
    #[serde(default = "default_client_wait_time")]
    pub client_wait_time_secs: u64,
    /// Interval between file-list polls while metadata downloads (milliseconds)
    #[serde(default = "default_poll_interval")]
    pub metadata_poll_interval_ms: u64,
    /// Give up waiting for torrent metadata after this long (seconds)
    #[serde(default = "default_metadata_timeout")]
    pub metadata_timeout_secs: u64,
    /// Client category assigned to added torrents
    #[serde(default)]
    pub category: String,
    /// Client tags assigned to added torrents
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            registry_path: default_registry_path(),
            default_download_dir: String::new(),
            default_meta: String::new(),
            enable_dot_spacing_in_file_name: false,
            client_wait_time_secs: default_client_wait_time(),
            metadata_poll_interval_ms: default_poll_interval(),
            metadata_timeout_secs: default_metadata_timeout(),
            category: String::new(),
            tags: Vec::new(),
        }
    }
}

fn default_registry_path() -> PathBuf {
    PathBuf::from("titles.toml")
}

fn default_client_wait_time() -> u64 {
    2
}

fn default_poll_interval() -> u64 {
    2000
}

fn default_metadata_timeout() -> u64 {
    120
}

/// Retry schedule for tracker and client calls.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
    /// Exponential backoff multiplier
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_max_attempts() -> u32 {
    10
}

fn default_initial_delay() -> u64 {
    1000
}

fn default_max_delay() -> u64 {
    10_000
}

fn default_backoff_multiplier() -> f64 {
    1.5
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

/// Torrent client selection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    pub backend: ClientBackend,
    /// Required when backend = "qbittorrent"
    #[serde(default)]
    pub qbittorrent: Option<QBittorrentConfig>,
    /// Required when backend = "transmission"
    #[serde(default)]
    pub transmission: Option<TransmissionConfig>,
}

/// Available torrent client backends
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClientBackend {
    Qbittorrent,
    Transmission,
}

/// qBittorrent Web UI connection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QBittorrentConfig {
    /// Web UI URL (e.g., "http://localhost:8080")
    pub url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
    /// Save path used when a request does not name one
    #[serde(default)]
    pub download_path: Option<String>,
}

/// Transmission RPC connection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransmissionConfig {
    /// RPC endpoint (e.g., "http://localhost:9091/transmission/rpc")
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
    /// Download dir used when a request does not name one
    #[serde(default)]
    pub download_path: Option<String>,
}

/// Tracker metadata endpoint
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrackerConfig {
    /// Tracker base URL; relative torrent links resolve against it
    pub url: String,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_timeout() -> u32 {
    30
}

/// Config with secrets redacted, safe to log
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub application: ApplicationConfig,
    pub retry: RetryConfig,
    pub client_backend: ClientBackend,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_url: Option<String>,
    pub client_credentials_configured: bool,
    pub tracker_url: String,
    pub tracker_api_key_configured: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        let (client_url, client_credentials_configured) = match config.client.backend {
            ClientBackend::Qbittorrent => {
                let qb = config.client.qbittorrent.as_ref();
                (
                    qb.map(|q| q.url.clone()),
                    qb.is_some_and(|q| !q.password.is_empty()),
                )
            }
            ClientBackend::Transmission => {
                let tr = config.client.transmission.as_ref();
                (
                    tr.map(|t| t.url.clone()),
                    tr.is_some_and(|t| t.password.as_deref().is_some_and(|p| !p.is_empty())),
                )
            }
        };
        Self {
            application: config.application.clone(),
            retry: config.retry.clone(),
            client_backend: config.client.backend,
            client_url,
            client_credentials_configured,
            tracker_url: config.tracker.url.clone(),
            tracker_api_key_configured: config
                .tracker
                .api_key
                .as_ref()
                .is_some_and(|k| !k.is_empty()),
        }
    }
}
