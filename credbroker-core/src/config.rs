//! Broker configuration handling.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config from {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to parse the configuration file.
    #[error("failed to parse config from {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// Failed to create the data directory.
    #[error("failed to create data directory {path}: {source}")]
    DataDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Directory for storing the account registry.
    pub data_dir: PathBuf,

    /// Path to the configuration file that was loaded.
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Bound on a single provider mint call, in seconds.
    #[serde(default = "default_mint_timeout_secs")]
    pub mint_timeout_secs: u64,

    /// Prefer the OS keyring for password material.
    #[serde(default = "default_prefer_keyring")]
    pub prefer_keyring: bool,
}

fn default_mint_timeout_secs() -> u64 {
    10
}

fn default_prefer_keyring() -> bool {
    true
}

impl Default for BrokerConfig {
    fn default() -> Self {
        let data_dir = project_dirs()
            .map(|d| d.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".credbroker"));

        Self {
            data_dir,
            config_path: PathBuf::new(),
            mint_timeout_secs: default_mint_timeout_secs(),
            prefer_keyring: default_prefer_keyring(),
        }
    }
}

impl BrokerConfig {
    /// The mint timeout as a [`Duration`].
    pub fn mint_timeout(&self) -> Duration {
        Duration::from_secs(self.mint_timeout_secs)
    }

    /// Path of the account registry file inside the data directory.
    pub fn accounts_path(&self) -> PathBuf {
        self.data_dir.join("accounts.json")
    }
}

/// Load configuration from the default location or create defaults.
pub fn load_config() -> Result<BrokerConfig, ConfigError> {
    let config_path = project_dirs()
        .map(|d| d.config_dir().join("broker.toml"))
        .unwrap_or_else(|| PathBuf::from("credbroker.toml"));

    let mut config = if config_path.exists() {
        let contents = std::fs::read_to_string(&config_path).map_err(|e| ConfigError::Read {
            path: config_path.clone(),
            source: e,
        })?;
        toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: config_path.clone(),
            source: e,
        })?
    } else {
        BrokerConfig::default()
    };

    config.config_path = config_path;

    std::fs::create_dir_all(&config.data_dir).map_err(|e| ConfigError::DataDir {
        path: config.data_dir.clone(),
        source: e,
    })?;

    Ok(config)
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("dev", "credbroker", "credbroker")
}
