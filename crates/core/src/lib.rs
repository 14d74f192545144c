pub mod config;
pub mod detector;
pub mod naming;
pub mod orchestrator;
pub mod registry;
pub mod rename;
pub mod retry;
pub mod testing;
pub mod torrent_client;
pub mod tracker;

pub use config::{
    load_config, load_config_from_str, validate_config, ClientBackend, Config, ConfigError,
    SanitizedConfig,
};
pub use detector::{classify, ChangeReason, UpdateVerdict};
pub use naming::{EpisodeNumberResolver, MetaTags, NameComposer, NamingError};
pub use orchestrator::{
    AddRequest, AutoPrompt, OperatorPrompt, OrchestratorConfig, RenameOrchestrator, RunReport,
    TitleError, TitleOutcome, TitlePhase,
};
pub use registry::{RegistryError, RegistryLock, TitleEntry, TitleRegistry};
pub use rename::{RenameApplier, RenameBatch, RenameError, RenamePlanner};
pub use retry::RetryPolicy;
pub use torrent_client::{
    QBittorrentClient, TorrentClient, TorrentClientError, TransmissionClient,
};
pub use tracker::{HttpTracker, TorrentObservation, Tracker, TrackerError};
