//! Recipe store error types.

use thiserror::Error;

/// Errors that can occur while looking up recipes.
#[derive(Debug, Error)]
pub enum RecipeStoreError {
    /// Recipe name is not valid.
    #[error("invalid recipe name: {0}")]
    InvalidName(String),

    /// The call did not complete in time.
    #[error("request timed out")]
    Timeout,

    /// The store could not be reached.
    #[error("transport error: {0}")]
    Transport(String),

    /// The store answered with an unexpected status.
    #[error("unexpected response ({status}): {message}")]
    Unexpected {
        /// HTTP status code.
        status: u16,
        /// Error message from the store.
        message: String,
    },
}
