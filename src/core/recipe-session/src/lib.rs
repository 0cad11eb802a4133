//! # Recipe Session
//!
//! Identity and session management for the recipe CLI.
//!
//! A session pairs a directory user record with a live authentication token
//! and is tracked per [`ExecutionContext`]:
//!
//! - **Unauthenticated**: nothing cached, no `auth` record in config.
//! - **Persisted**: an `auth` record exists in the context's config.
//! - **Active**: the session is cached in this process.
//!
//! [`SessionManager`] moves a context between these states through
//! `login`, `sign_up`, `logout` and `get_current_user` (rehydration).

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cache;
pub mod data;
pub mod error;
pub mod manager;
pub mod provider;


pub use cache::SessionCache;
pub use data::{AuthData, CurrentUser, RawAuth, UserData, UserPatch};
pub use error::{DirectoryError, ProviderError, SessionError};
pub use manager::{SessionManager, AUTH_CONFIG_KEY};
pub use provider::{CreatedUser, Credentials, Directory, IdentityProvider, UsernameRegistry};

pub use recipe_config::ExecutionContext;
