//! Config storage error types.

use thiserror::Error;

/// Errors that can occur during config operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Key is empty, too long or contains forbidden characters.
    #[error("invalid config key: {0}")]
    InvalidKey(String),

    /// Unknown execution context name.
    #[error("unknown context: {0}")]
    UnknownContext(String),

    /// Connection to the underlying store failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Query against the underlying store failed.
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Value could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Generic I/O error.
    #[error("io error: {0}")]
    Io(String),
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Serialization(e.to_string())
    }
}
