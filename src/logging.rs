//! Tracing subscriber setup driven by the `[logging]` config section

use crate::config::LoggingConfig;
use crate::error::{ChainError, Result};
use std::str::FromStr;
use tracing::Level;

/// Install the global fmt subscriber. Returns Ok(false) when one is already installed.
pub fn init(config: &LoggingConfig) -> Result<bool> {
    let level = Level::from_str(&config.level).map_err(|e| {
        ChainError::ConfigError(format!("Invalid log level '{}': {}", config.level, e))
    })?;

    let builder = tracing_subscriber::fmt().with_max_level(level).with_target(false);
    let installed = if config.json {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    };
    Ok(installed)
}
