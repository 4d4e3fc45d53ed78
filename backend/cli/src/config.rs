use std::path::PathBuf;

use chatrelay_gateway::server::DEFAULT_MAX_MESSAGE_BYTES;
use chatrelay_logging::{LogFormat, LogSettings};

/// chatrelay runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server bind address
    pub bind_address: String,
    /// HTTP server port
    pub port: u16,
    /// Origin of the chat front end, allowed by CORS
    pub frontend_url: String,
    /// Log level
    pub log_level: String,
    pub log_format: LogFormat,
    pub log_dir: Option<PathBuf>,
    /// Largest inbound WebSocket message accepted
    pub max_message_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 5000,
            frontend_url: "http://localhost:3000".to_string(),
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            log_dir: None,
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
        }
    }
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            bind_address: var("CHATRELAY_BIND").unwrap_or(defaults.bind_address),
            port: var("PORT")
                .and_then(|p| p.trim().parse().ok())
                .unwrap_or(defaults.port),
            frontend_url: var("FRONTEND_URL").unwrap_or(defaults.frontend_url),
            log_level: var("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: var("CHATRELAY_LOG_FORMAT")
                .map(|f| LogFormat::parse(&f))
                .unwrap_or(defaults.log_format),
            log_dir: var("CHATRELAY_LOG_DIR").map(PathBuf::from),
            max_message_bytes: var("CHATRELAY_MAX_MESSAGE_BYTES")
                .and_then(|n| n.trim().parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_message_bytes),
        }
    }

    pub fn log_settings(&self) -> LogSettings {
        LogSettings {
            level: self.log_level.clone(),
            format: self.log_format,
            log_dir: self.log_dir.clone(),
        }
    }
}
