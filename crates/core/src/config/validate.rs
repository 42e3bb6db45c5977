use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Poll intervals and the metadata deadline are non-zero
/// - The metadata deadline is not shorter than its poll interval
/// - The session listen port is not 0 or 65535
/// - The outcome log buffer is non-empty
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let monitor = &config.monitor;

    if monitor.event_poll_interval_ms == 0 {
        return Err(ConfigError::ValidationError(
            "monitor.event_poll_interval_ms cannot be 0".to_string(),
        ));
    }

    if monitor.metadata_poll_interval_ms == 0 {
        return Err(ConfigError::ValidationError(
            "monitor.metadata_poll_interval_ms cannot be 0".to_string(),
        ));
    }

    if monitor.metadata_timeout_ms < monitor.metadata_poll_interval_ms {
        return Err(ConfigError::ValidationError(format!(
            "monitor.metadata_timeout_ms ({}) must be at least metadata_poll_interval_ms ({})",
            monitor.metadata_timeout_ms, monitor.metadata_poll_interval_ms
        )));
    }

    match config.session.listen_port {
        Some(0) => {
            return Err(ConfigError::ValidationError(
                "session.listen_port cannot be 0".to_string(),
            ));
        }
        Some(u16::MAX) => {
            return Err(ConfigError::ValidationError(format!(
                "session.listen_port must be below {}",
                u16::MAX
            )));
        }
        _ => {}
    }

    if config.session.stats_interval_ms == 0 {
        return Err(ConfigError::ValidationError(
            "session.stats_interval_ms cannot be 0".to_string(),
        ));
    }

    if config.outcome_log.buffer_size == 0 {
        return Err(ConfigError::ValidationError(
            "outcome_log.buffer_size cannot be 0".to_string(),
        ));
    }

    Ok(())
}
