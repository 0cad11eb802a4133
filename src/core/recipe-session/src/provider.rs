//! Remote collaborators of the session manager.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{DirectoryError, ProviderError, RawAuth, UserData, UserPatch};

/// Email/password pair sent to the identity provider.
///
/// The password is wiped from memory on drop and never printed.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    /// Account email.
    pub email: String,
    /// Account password.
    pub password: String,
}

impl Credentials {
    /// Creates a credential pair.
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Account created by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedUser {
    /// Provider-assigned subject id.
    pub uid: String,
}

/// Remote identity provider.
///
/// Every successful authentication opens a provider-side session identified
/// by its token; [`IdentityProvider::unauth`] ends one of them.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Authenticates with email and password.
    async fn auth_with_password(&self, credentials: &Credentials)
        -> Result<RawAuth, ProviderError>;

    /// Authenticates with a previously issued token.
    async fn auth_with_custom_token(&self, token: &str) -> Result<RawAuth, ProviderError>;

    /// Creates a new account.
    async fn create_user(&self, credentials: &Credentials) -> Result<CreatedUser, ProviderError>;

    /// Ends the provider-side session of `token`.
    async fn unauth(&self, token: &str) -> Result<(), ProviderError>;

    /// Returns the name of this provider for logging/debugging.
    fn name(&self) -> &'static str;
}

/// Remote store of user records keyed by subject id.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Reads the record of a user.
    async fn get(&self, id: &str) -> Result<UserData, DirectoryError>;

    /// Writes the full record of a user.
    async fn set(&self, id: &str, record: &UserData) -> Result<(), DirectoryError>;

    /// Updates some fields of a user record.
    async fn update(&self, id: &str, patch: &UserPatch) -> Result<(), DirectoryError>;
}

/// Remote registry of claimed usernames.
#[async_trait]
pub trait UsernameRegistry: Send + Sync {
    /// Atomically claims `username` for `user`.
    async fn change_users_username(
        &self,
        user: &UserData,
        username: &str,
    ) -> Result<(), DirectoryError>;
}
