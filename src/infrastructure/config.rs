//! Configuration management for the metered web server
//!
//! Loads configuration from config.toml at startup. The 60-second statistic
//! window is fixed by design and deliberately not configurable here.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::history::HISTORY_FILENAME;

/// Metered web server configuration
///
/// Loaded from config.toml at startup. Every field has a default so a
/// missing file runs the server with stock settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Metering pipeline settings
    #[serde(default)]
    pub meter: MeterConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Hostname or address to bind
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Metering pipeline configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MeterConfig {
    /// Request history file, resolved against the working directory
    #[serde(default = "default_history_file")]
    pub history_file: PathBuf,

    /// Ingestion queue capacity. Senders block once the aggregator is this
    /// far behind.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            history_file: default_history_file(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_history_file() -> PathBuf {
    PathBuf::from(HISTORY_FILENAME)
}

fn default_queue_capacity() -> usize {
    1024
}

impl Config {
    /// Load configuration from config.toml file
    ///
    /// If the file doesn't exist, returns default configuration.
    /// # Errors
    /// Returns error if file exists but cannot be parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => {
                let config: Config = toml::from_str(&contents)
                    .map_err(|e| ConfigError::ParseError(e.to_string()))?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // File not found - use defaults
                Ok(Config::default())
            }
            Err(e) => Err(ConfigError::IoError(e)),
        }
    }

    /// Bind endpoint composed from hostname and port
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading file
    IoError(std::io::Error),
    /// Parse error (invalid TOML)
    ParseError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "Failed to read config file: {}", e),
            ConfigError::ParseError(e) => write!(f, "Failed to parse config: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::IoError(e) => Some(e),
            ConfigError::ParseError(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.meter.history_file, PathBuf::from("req.his"));
        assert_eq!(config.meter.queue_capacity, 1024);
    }

    #[test]
    fn test_endpoint_composition() {
        let mut config = Config::default();
        config.server.host = "127.0.0.1".to_string();
        config.server.port = 9080;
        assert_eq!(config.endpoint(), "127.0.0.1:9080");
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [server]
            port = 9090
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.meter.queue_capacity, 1024);
    }

    #[test]
    fn test_invalid_toml_rejected() {
        assert!(toml::from_str::<Config>("server = \"nope\"").is_err());
    }
}
