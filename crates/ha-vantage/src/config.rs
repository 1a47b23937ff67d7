//! Config entry data for a Vantage controller

use ha_config_entries::{ConfigEntry, SetupError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Config entry data errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config entry data: {0}")]
    Invalid(#[from] serde_json::Error),

    #[error("host must not be empty")]
    MissingHost,
}

impl From<ConfigError> for SetupError {
    fn from(err: ConfigError) -> Self {
        SetupError::Failed(err.to_string())
    }
}

/// Connection settings stored in the config entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VantageConfig {
    pub host: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_ssl")]
    pub ssl: bool,
}

fn default_ssl() -> bool {
    true
}

impl VantageConfig {
    /// Read and validate the settings of a config entry
    pub fn from_entry(entry: &ConfigEntry) -> Result<Self, ConfigError> {
        let config: VantageConfig = serde_json::from_value(entry.data_value())?;
        if config.host.trim().is_empty() {
            return Err(ConfigError::MissingHost);
        }
        Ok(config)
    }
}
