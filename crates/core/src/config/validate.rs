use super::{types::Config, ClientBackend, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Registry path is set
/// - Retry schedule is usable
/// - The selected client backend has its section
/// - Tracker URL is set
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.application.registry_path.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "application.registry_path cannot be empty".to_string(),
        ));
    }

    if config.application.metadata_poll_interval_ms == 0 {
        return Err(ConfigError::ValidationError(
            "application.metadata_poll_interval_ms cannot be 0".to_string(),
        ));
    }

    let retry = &config.retry;
    if retry.max_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "retry.max_attempts cannot be 0".to_string(),
        ));
    }
    if retry.backoff_multiplier < 1.0 || !retry.backoff_multiplier.is_finite() {
        return Err(ConfigError::ValidationError(
            "retry.backoff_multiplier must be at least 1.0".to_string(),
        ));
    }
    if retry.initial_delay_ms > retry.max_delay_ms {
        return Err(ConfigError::ValidationError(
            "retry.initial_delay_ms cannot exceed retry.max_delay_ms".to_string(),
        ));
    }

    match config.client.backend {
        ClientBackend::Qbittorrent => {
            let url = config.client.qbittorrent.as_ref().map(|qb| qb.url.as_str());
            validate_backend_url("qbittorrent", url)?;
        }
        ClientBackend::Transmission => {
            let url = config.client.transmission.as_ref().map(|tr| tr.url.as_str());
            validate_backend_url("transmission", url)?;
        }
    }

    if config.tracker.url.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "tracker.url cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// The selected backend needs its section and a non-empty URL in it.
fn validate_backend_url(backend: &str, url: Option<&str>) -> Result<(), ConfigError> {
    match url {
        Some(url) if !url.trim().is_empty() => Ok(()),
        Some(_) => Err(ConfigError::ValidationError(format!(
            "client.{}.url cannot be empty",
            backend
        ))),
        None => Err(ConfigError::ValidationError(format!(
            "client.{0} section is required for backend \"{0}\"",
            backend
        ))),
    }
}
