//! Error types shared by the sales analytics crates

use thiserror::Error;

/// Result type alias for shared operations
pub type Result<T> = std::result::Result<T, SalesError>;

/// Errors raised while setting up a process (configuration, logging, files)
#[derive(Error, Debug)]
pub enum SalesError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl SalesError {
    /// Configuration error for an environment variable holding an unusable value
    pub fn invalid_env(key: &str, value: &str, reason: impl std::fmt::Display) -> Self {
        Self::Config(format!("{key}={value:?} is invalid: {reason}"))
    }
}
