//! Session error types.

use recipe_config::{ConfigError, ExecutionContext};
use thiserror::Error;

/// Errors reported by the identity provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Email/password pair was rejected.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Token was rejected (expired, revoked or malformed).
    #[error("invalid token")]
    InvalidToken,

    /// An account already exists for the email.
    #[error("email already in use: {0}")]
    EmailTaken(String),

    /// The call did not complete in time.
    #[error("request timed out")]
    Timeout,

    /// The provider could not be reached.
    #[error("transport error: {0}")]
    Transport(String),

    /// The provider answered with an unexpected status.
    #[error("unexpected response ({status}): {message}")]
    Unexpected {
        /// HTTP status code.
        status: u16,
        /// Error message from the provider.
        message: String,
    },
}

/// Errors reported by the user directory and the username registry.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// No user record exists for the id.
    #[error("user not found: {0}")]
    NotFound(String),

    /// The username is already claimed by another user.
    #[error("username already taken: {0}")]
    UsernameTaken(String),

    /// The call did not complete in time.
    #[error("request timed out")]
    Timeout,

    /// The directory could not be reached.
    #[error("transport error: {0}")]
    Transport(String),

    /// The directory answered with an unexpected status.
    #[error("unexpected response ({status}): {message}")]
    Unexpected {
        /// HTTP status code.
        status: u16,
        /// Error message from the directory.
        message: String,
    },
}

/// Errors returned by [`crate::SessionManager`].
///
/// Collaborator errors are wrapped unchanged.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No cached or persisted session exists for the context.
    #[error("no auth found for context {0}")]
    NoAuthFound(ExecutionContext),

    /// Identity provider call failed.
    #[error("identity provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Directory read or write failed.
    #[error("directory error: {0}")]
    Directory(#[from] DirectoryError),

    /// Persisted config could not be read or written.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}
