use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Prefix of environment overrides. Nested keys use `__`, so
/// `TICKETDESK_LOCALE__TICKET_MARKER` sets `locale.ticket_marker`.
pub const ENV_PREFIX: &str = "TICKETDESK_";

/// Load the TOML file at `path`, then apply environment overrides.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }
    extract(Figment::from(Toml::file(path)))
}

/// Same as `load_config` with the TOML given inline.
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    extract(Figment::from(Toml::string(toml_str)))
}

fn extract(file: Figment) -> Result<Config, ConfigError> {
    file.merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}
