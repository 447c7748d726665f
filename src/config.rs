// src/config.rs
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variable pointing at an explicit config file
pub const CONFIG_ENV: &str = "COPANY_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not determine {0} directory")]
    NoDirectory(&'static str),

    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub database_path: PathBuf,
    pub busy_timeout_ms: u64,
    /// Used when RUST_LOG is not set
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
            database_path: default_database_path().unwrap_or_else(|_| PathBuf::from("copany.db")),
            busy_timeout_ms: 5000,
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Load from `path`, or return defaults if the file does not exist
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load from `$COPANY_CONFIG`, else the user config directory
    pub fn load() -> Result<Self, ConfigError> {
        let path = match std::env::var_os(CONFIG_ENV) {
            Some(p) => PathBuf::from(p),
            None => get_config_file_path()?,
        };
        log::debug!("Loading config from {}", path.display());
        Self::load_from(&path)
    }
}

/// Get the config directory for copany
fn get_config_dir() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|p| p.join("copany"))
        .ok_or(ConfigError::NoDirectory("config"))
}

fn get_config_file_path() -> Result<PathBuf, ConfigError> {
    get_config_dir().map(|p| p.join("config.toml"))
}

fn default_database_path() -> Result<PathBuf, ConfigError> {
    dirs::data_dir()
        .map(|p| p.join("copany").join("copany.db"))
        .ok_or(ConfigError::NoDirectory("data"))
}
