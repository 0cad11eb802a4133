//! # Recipe Identity
//!
//! HTTP client for the remote services the recipe CLI talks to.
//!
//! ## Endpoints
//!
//! - `/v1/auth/*` - Password and token authentication, sign-out
//! - `/v1/accounts` - Account creation
//! - `/v1/users/{id}` - User directory
//! - `/v1/usernames/{username}` - Username registry
//! - `/v1/recipes/{name}` - Recipe metadata
//!
//! Error responses carry a JSON body `{"error": "..."}`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use recipe_session::{
    CreatedUser, Credentials, Directory, DirectoryError, IdentityProvider, ProviderError, RawAuth,
    UserData, UserPatch, UsernameRegistry,
};
use recipe_store::{RecipeData, RecipeStore, RecipeStoreError};

pub use error::ClientError;

/// Default timeout applied to every request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    token: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UsernameClaimRequest<'a> {
    user_id: &'a str,
}

// ============================================================================
// HTTP Client
// ============================================================================

/// HTTP client for the identity service, user directory, username registry
/// and recipe registry.
///
/// Keeps the token of each successful authentication keyed by its subject
/// id. Requests about a user carry that user's token as a bearer token,
/// until [`IdentityProvider::unauth`] revokes it.
pub struct IdentityClient {
    client: Client,
    base_url: Url,
    sessions: RwLock<HashMap<String, String>>,
}

impl IdentityClient {
    /// Creates a client for the service at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let base_url =
            Url::parse(base_url).map_err(|e| ClientError::InvalidBaseUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidBaseUrl(base_url.to_string()));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Build(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            sessions: RwLock::new(HashMap::new()),
        })
    }

    /// Returns the token of a subject's provider session, if any.
    pub async fn session_token(&self, uid: &str) -> Option<String> {
        self.sessions.read().await.get(uid).cloned()
    }

    /// Builds the URL of an endpoint from path segments.
    ///
    /// Segments are percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Attaches the session token of `uid`, if any.
    async fn authorized(&self, req: RequestBuilder, uid: &str) -> RequestBuilder {
        match self.sessions.read().await.get(uid) {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn start_session(&self, raw: &RawAuth) {
        self.sessions
            .write()
            .await
            .insert(raw.uid.clone(), raw.token.clone());
    }

    async fn end_session(&self, token: &str) {
        self.sessions.write().await.retain(|_, t| t != token);
    }

    /// Authenticates against an auth endpoint and starts a session.
    async fn authenticate<B: Serialize + ?Sized>(
        &self,
        path: &[&str],
        body: &B,
        rejected: ProviderError,
    ) -> Result<RawAuth, ProviderError> {
        let resp = self
            .client
            .post(self.endpoint(path))
            .json(body)
            .send()
            .await
            .map_err(provider_error)?;

        match resp.status() {
            s if s.is_success() => {
                let raw: RawAuth = resp.json().await.map_err(provider_error)?;
                self.start_session(&raw).await;
                debug!(uid = %raw.uid, "Provider session started");
                Ok(raw)
            },
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(rejected),
            _ => {
                let (status, message) = failure(resp).await;
                Err(ProviderError::Unexpected { status, message })
            },
        }
    }

    /// Sends a directory write and checks its status.
    async fn directory_write(&self, req: RequestBuilder, id: &str) -> Result<(), DirectoryError> {
        let resp = self
            .authorized(req, id)
            .await
            .send()
            .await
            .map_err(directory_error)?;

        match resp.status() {
            s if s.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(DirectoryError::NotFound(id.to_string())),
            _ => {
                let (status, message) = failure(resp).await;
                Err(DirectoryError::Unexpected { status, message })
            },
        }
    }
}

/// Extracts status and message of a failed response.
async fn failure(resp: Response) -> (u16, String) {
    let status = resp.status().as_u16();
    let message = resp
        .json::<ErrorResponse>()
        .await
        .map(|e| e.error)
        .unwrap_or_else(|_| "Unknown error".into());
    (status, message)
}

fn provider_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout
    } else {
        ProviderError::Transport(e.to_string())
    }
}

fn directory_error(e: reqwest::Error) -> DirectoryError {
    if e.is_timeout() {
        DirectoryError::Timeout
    } else {
        DirectoryError::Transport(e.to_string())
    }
}

fn store_error(e: reqwest::Error) -> RecipeStoreError {
    if e.is_timeout() {
        RecipeStoreError::Timeout
    } else {
        RecipeStoreError::Transport(e.to_string())
    }
}

// ============================================================================
// Collaborator Implementations
// ============================================================================

#[async_trait]
impl IdentityProvider for IdentityClient {
    async fn auth_with_password(
        &self,
        credentials: &Credentials,
    ) -> Result<RawAuth, ProviderError> {
        self.authenticate(
            &["v1", "auth", "password"],
            credentials,
            ProviderError::InvalidCredentials,
        )
        .await
    }

    async fn auth_with_custom_token(&self, token: &str) -> Result<RawAuth, ProviderError> {
        self.authenticate(
            &["v1", "auth", "token"],
            &TokenRequest { token },
            ProviderError::InvalidToken,
        )
        .await
    }

    async fn create_user(&self, credentials: &Credentials) -> Result<CreatedUser, ProviderError> {
        let resp = self
            .client
            .post(self.endpoint(&["v1", "accounts"]))
            .json(credentials)
            .send()
            .await
            .map_err(provider_error)?;

        match resp.status() {
            s if s.is_success() => resp.json().await.map_err(provider_error),
            StatusCode::CONFLICT => Err(ProviderError::EmailTaken(credentials.email.clone())),
            _ => {
                let (status, message) = failure(resp).await;
                Err(ProviderError::Unexpected { status, message })
            },
        }
    }

    async fn unauth(&self, token: &str) -> Result<(), ProviderError> {
        self.end_session(token).await;

        let resp = self
            .client
            .post(self.endpoint(&["v1", "auth", "logout"]))
            .bearer_auth(token)
            .send()
            .await
            .map_err(provider_error)?;

        if !resp.status().is_success() {
            let (status, message) = failure(resp).await;
            return Err(ProviderError::Unexpected { status, message });
        }

        debug!("Provider session ended");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recipe-identity"
    }
}

#[async_trait]
impl Directory for IdentityClient {
    async fn get(&self, id: &str) -> Result<UserData, DirectoryError> {
        let req = self.client.get(self.endpoint(&["v1", "users", id]));
        let resp = self
            .authorized(req, id)
            .await
            .send()
            .await
            .map_err(directory_error)?;

        match resp.status() {
            s if s.is_success() => resp.json().await.map_err(directory_error),
            StatusCode::NOT_FOUND => Err(DirectoryError::NotFound(id.to_string())),
            _ => {
                let (status, message) = failure(resp).await;
                Err(DirectoryError::Unexpected { status, message })
            },
        }
    }

    async fn set(&self, id: &str, record: &UserData) -> Result<(), DirectoryError> {
        let req = self.client.put(self.endpoint(&["v1", "users", id])).json(record);
        self.directory_write(req, id).await
    }

    async fn update(&self, id: &str, patch: &UserPatch) -> Result<(), DirectoryError> {
        let req = self.client.patch(self.endpoint(&["v1", "users", id])).json(patch);
        self.directory_write(req, id).await
    }
}

#[async_trait]
impl UsernameRegistry for IdentityClient {
    async fn change_users_username(
        &self,
        user: &UserData,
        username: &str,
    ) -> Result<(), DirectoryError> {
        let req = self
            .client
            .put(self.endpoint(&["v1", "usernames", username]))
            .json(&UsernameClaimRequest { user_id: &user.id });
        let resp = self
            .authorized(req, &user.id)
            .await
            .send()
            .await
            .map_err(directory_error)?;

        match resp.status() {
            s if s.is_success() => Ok(()),
            StatusCode::CONFLICT => Err(DirectoryError::UsernameTaken(username.to_string())),
            StatusCode::NOT_FOUND => Err(DirectoryError::NotFound(user.id.clone())),
            _ => {
                let (status, message) = failure(resp).await;
                Err(DirectoryError::Unexpected { status, message })
            },
        }
    }
}

#[async_trait]
impl RecipeStore for IdentityClient {
    async fn get_recipe(&self, name: &str) -> Result<Option<RecipeData>, RecipeStoreError> {
        let resp = self
            .client
            .get(self.endpoint(&["v1", "recipes", name]))
            .send()
            .await
            .map_err(store_error)?;

        match resp.status() {
            s if s.is_success() => resp.json().await.map(Some).map_err(store_error),
            StatusCode::NOT_FOUND => Ok(None),
            _ => {
                let (status, message) = failure(resp).await;
                Err(RecipeStoreError::Unexpected { status, message })
            },
        }
    }
}
