use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Reconciliation concurrency is at least 1
/// - Worker poll interval is not 0
/// - Scanner accepts at least one extension
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.workers.reconcile_concurrency == 0 {
        return Err(ConfigError::ValidationError(
            "workers.reconcile_concurrency must be at least 1".to_string(),
        ));
    }

    if config.workers.poll_interval_ms == 0 {
        return Err(ConfigError::ValidationError(
            "workers.poll_interval_ms cannot be 0".to_string(),
        ));
    }

    if config.scanner.extensions.is_empty() {
        return Err(ConfigError::ValidationError(
            "scanner.extensions cannot be empty".to_string(),
        ));
    }

    if let Some(source) = &config.source {
        if source.url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "source.url cannot be empty".to_string(),
            ));
        }
    }

    Ok(())
}
