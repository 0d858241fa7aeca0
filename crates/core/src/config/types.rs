use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub locale: LocaleConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub staff: StaffConfig,
    #[serde(default)]
    pub thread_api: Option<ThreadApiConfig>,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("ticketdesk.db")
}

/// Locale strings the core needs to parse staff messages.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LocaleConfig {
    /// Word that follows every ticket token, e.g. `#T000001 ticket`.
    pub ticket_marker: String,
}

/// Staff chat the tickets are mirrored into.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StaffConfig {
    /// Chat id of the staff group.
    #[serde(default)]
    pub chat_id: i64,
    /// Whether the staff chat groups tickets into forum threads.
    #[serde(default)]
    pub threads: bool,
}

/// Forum thread API (Telegram Bot API compatible)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ThreadApiConfig {
    /// Base URL (e.g., "https://api.telegram.org")
    pub url: String,
    /// Bot token
    pub token: String,
    /// Request timeout in seconds (default: 10)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

fn default_timeout() -> u32 {
    10
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub locale: LocaleConfig,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub staff: StaffConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_api: Option<SanitizedThreadApiConfig>,
}

/// Sanitized thread API config (token hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedThreadApiConfig {
    pub url: String,
    pub token_configured: bool,
    pub timeout_secs: u32,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            locale: config.locale.clone(),
            server: config.server.clone(),
            database: config.database.clone(),
            staff: config.staff.clone(),
            thread_api: config
                .thread_api
                .as_ref()
                .map(|t| SanitizedThreadApiConfig {
                    url: t.url.clone(),
                    token_configured: !t.token.is_empty(),
                    timeout_secs: t.timeout_secs,
                }),
        }
    }
}
