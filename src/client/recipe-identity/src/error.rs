//! Client construction errors.

use thiserror::Error;

/// Errors that can occur while building an [`crate::IdentityClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// Base URL cannot be parsed or cannot carry paths.
    #[error("invalid base url: {0}")]
    InvalidBaseUrl(String),

    /// HTTP client could not be created.
    #[error("failed to create HTTP client: {0}")]
    Build(String),
}
