use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Ticket marker is not blank
/// - Thread support has an API to talk to
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.locale.ticket_marker.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "locale.ticket_marker cannot be empty".to_string(),
        ));
    }

    if config.staff.threads && config.thread_api.is_none() {
        return Err(ConfigError::ValidationError(
            "staff.threads requires a [thread_api] section".to_string(),
        ));
    }

    Ok(())
}
