//! Configuration management for the chain guard

use crate::error::{ChainError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub guard: GuardConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// The guard stays dormant while the local tip is at or below this height.
    #[serde(default)]
    pub activation_height: u64,
    /// Segments shorter than this are never scored.
    #[serde(default = "default_min_segment_length")]
    pub min_segment_length: usize,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            activation_height: 0,
            min_segment_length: default_min_segment_length(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_min_segment_length() -> usize {
    5
}

fn default_level() -> String {
    "info".to_string()
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.guard.min_segment_length == 0 {
            return Err(ChainError::ConfigError(
                "guard.min_segment_length must be at least 1".to_string(),
            ));
        }

        if tracing::Level::from_str(&self.logging.level).is_err() {
            return Err(ChainError::ConfigError(format!(
                "logging.level '{}' is not a valid level",
                self.logging.level
            )));
        }

        Ok(())
    }
}

/// Load `config.toml` from the working directory, using defaults when it is absent.
pub fn load_config() -> Result<Config> {
    let path = Path::new(DEFAULT_CONFIG_PATH);
    if !path.exists() {
        return Ok(Config::default());
    }
    load_config_from(path)
}

pub fn load_config_from(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    let config_str = fs::read_to_string(path).map_err(|e| {
        ChainError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
    })?;
    Config::from_toml_str(&config_str)
}
