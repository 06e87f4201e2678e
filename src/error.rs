//! Error types for the chain guard

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    /// The guard scored the incoming segment above zero. The caller must not adopt it.
    #[error("Chain rejected as a malicious reorganization (penalty {penalty})")]
    RejectedReorg { penalty: i64 },
    #[error("Invalid block: {0}")]
    InvalidBlock(String),
    #[error("Fork point not found for segment starting at height {0}")]
    ForkNotFound(u64),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Network error: {0}")]
    NetworkError(String),
}

impl ChainError {
    /// True when the error is a guard verdict rather than a malformed segment.
    pub fn is_rejected_reorg(&self) -> bool {
        matches!(self, ChainError::RejectedReorg { .. })
    }
}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::IoError(err.to_string())
    }
}

impl From<toml::de::Error> for ChainError {
    fn from(err: toml::de::Error) -> Self {
        ChainError::ConfigError(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;
