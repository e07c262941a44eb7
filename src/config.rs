//! Configuration module
//!
//! Reads configuration from a TOML file (~/.config/vitals-hub/config.toml by
//! default, `VITALS_HUB_CONFIG` overrides the path). Every field has a
//! default, so a missing or partial file still yields a runnable config.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub hub: HubConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: display.clone(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })
    }
}

/// Listen addresses and lifecycle settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// WebSocket host address
    pub ws_host: String,
    /// WebSocket port (devices and dashboards connect here)
    pub ws_port: u16,
    /// Status API host address
    pub api_host: String,
    /// Status API port
    pub api_port: u16,
    /// Seconds to wait for in-flight cleanup on shutdown
    pub shutdown_timeout_secs: u64,
}

impl ServerConfig {
    pub fn ws_address(&self) -> String {
        format!("{}:{}", self.ws_host, self.ws_port)
    }

    pub fn api_address(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ws_host: "0.0.0.0".to_string(),
            ws_port: 3000,
            api_host: "0.0.0.0".to_string(),
            api_port: 8090,
            shutdown_timeout_secs: 10,
        }
    }
}

/// Hub behavior tuning
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Seconds between a disconnect signal and actual patient removal
    pub grace_period_secs: u64,
    /// Samples kept per patient before the oldest is evicted
    pub history_capacity: usize,
    /// Ward assigned to feeds that never declare one
    pub default_ward: u16,
    /// Seconds an unclassified connection may stay silent
    pub unclassified_idle_secs: u64,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            grace_period_secs: 5,
            history_capacity: 20,
            default_ward: 101,
            unclassified_idle_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Default configuration file location
pub fn default_config_path() -> PathBuf {
    dirs_next::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("vitals-hub")
        .join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_complete() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.server.ws_address(), "0.0.0.0:3000");
        assert_eq!(cfg.hub.grace_period_secs, 5);
        assert_eq!(cfg.hub.history_capacity, 20);
        assert_eq!(cfg.hub.default_ward, 101);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [hub]
            grace_period_secs = 8

            [server]
            ws_port = 4000
            "#,
        )
        .unwrap();
        assert_eq!(cfg.hub.grace_period_secs, 8);
        assert_eq!(cfg.hub.default_ward, 101);
        assert_eq!(cfg.server.ws_port, 4000);
        assert_eq!(cfg.server.api_port, 8090);
    }
}
