//! Integration tests for the recipe session stack.
//!
//! These tests drive the session manager, the SQLite config store and the
//! HTTP client against an in-process identity service.

// Allow unwrap() in tests - panics are acceptable for test assertions
#![allow(clippy::disallowed_methods)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tokio::task::JoinHandle;

use recipe_session::{Credentials, RawAuth, UserData, UserPatch};
use recipe_store::RecipeData;

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct TokenRequest {
    token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsernameClaimRequest {
    user_id: String,
}

// ============================================================================
// Mock State
// ============================================================================

/// In-memory state of the mock identity service.
#[derive(Debug, Default)]
pub struct MockState {
    /// Accounts by email: (password, uid).
    pub accounts: HashMap<String, (String, String)>,
    /// Live tokens and their uid.
    pub tokens: HashMap<String, String>,
    /// Directory records by uid.
    pub users: HashMap<String, UserData>,
    /// Claimed usernames and their uid.
    pub usernames: HashMap<String, String>,
    /// Published recipes by name.
    pub recipes: HashMap<String, RecipeData>,
    issued: u32,
}

impl MockState {
    fn issue(&mut self, uid: &str, provider: &str) -> RawAuth {
        self.issued += 1;
        let token = format!("tok-{}-{}", uid, self.issued);
        self.tokens.insert(token.clone(), uid.to_string());
        RawAuth {
            token,
            uid: uid.to_string(),
            provider: Some(provider.to_string()),
            expires: None,
        }
    }
}

pub type Shared = Arc<Mutex<MockState>>;

fn lock(state: &Shared) -> MutexGuard<'_, MockState> {
    state.lock().unwrap()
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

/// Returns the uid owning the request's bearer token.
fn caller(state: &MockState, headers: &HeaderMap) -> Option<String> {
    bearer(headers).and_then(|token| state.tokens.get(&token).cloned())
}

// ============================================================================
// Handlers
// ============================================================================

async fn auth_password(State(state): State<Shared>, Json(creds): Json<Credentials>) -> Response {
    let mut state = lock(&state);
    match state.accounts.get(&creds.email).cloned() {
        Some((password, uid)) if password == creds.password => {
            Json(state.issue(&uid, "password")).into_response()
        },
        _ => error(StatusCode::UNAUTHORIZED, "invalid credentials"),
    }
}

async fn auth_token(State(state): State<Shared>, Json(req): Json<TokenRequest>) -> Response {
    let state = lock(&state);
    match state.tokens.get(&req.token) {
        Some(uid) => Json(RawAuth {
            token: req.token.clone(),
            uid: uid.clone(),
            provider: Some("custom".to_string()),
            expires: None,
        })
        .into_response(),
        None => error(StatusCode::UNAUTHORIZED, "invalid token"),
    }
}

async fn create_account(State(state): State<Shared>, Json(creds): Json<Credentials>) -> Response {
    let mut state = lock(&state);
    if state.accounts.contains_key(&creds.email) {
        return error(StatusCode::CONFLICT, "email already in use");
    }

    let uid = format!("uid-{}", state.accounts.len() + 1);
    state
        .accounts
        .insert(creds.email.clone(), (creds.password.clone(), uid.clone()));
    (StatusCode::CREATED, Json(json!({ "uid": uid }))).into_response()
}

async fn logout(State(state): State<Shared>, headers: HeaderMap) -> Response {
    if let Some(token) = bearer(&headers) {
        lock(&state).tokens.remove(&token);
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn get_user(State(state): State<Shared>, Path(id): Path<String>) -> Response {
    match lock(&state).users.get(&id) {
        Some(user) => Json(user.clone()).into_response(),
        None => error(StatusCode::NOT_FOUND, "user not found"),
    }
}

async fn put_user(
    State(state): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(user): Json<UserData>,
) -> Response {
    let mut state = lock(&state);
    if caller(&state, &headers).as_deref() != Some(id.as_str()) {
        return error(StatusCode::FORBIDDEN, "not the record owner");
    }
    state.users.insert(id, user);
    StatusCode::NO_CONTENT.into_response()
}

async fn patch_user(
    State(state): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(patch): Json<UserPatch>,
) -> Response {
    let mut state = lock(&state);
    if caller(&state, &headers).as_deref() != Some(id.as_str()) {
        return error(StatusCode::FORBIDDEN, "not the record owner");
    }
    match state.users.get_mut(&id) {
        Some(user) => {
            patch.apply(user);
            StatusCode::NO_CONTENT.into_response()
        },
        None => error(StatusCode::NOT_FOUND, "user not found"),
    }
}

async fn claim_username(
    State(state): State<Shared>,
    Path(username): Path<String>,
    Json(req): Json<UsernameClaimRequest>,
) -> Response {
    let mut state = lock(&state);
    if !state.users.contains_key(&req.user_id) {
        return error(StatusCode::NOT_FOUND, "user not found");
    }
    if state
        .usernames
        .get(&username)
        .is_some_and(|owner| owner != &req.user_id)
    {
        return error(StatusCode::CONFLICT, "username taken");
    }

    state.usernames.insert(username.clone(), req.user_id.clone());
    if let Some(user) = state.users.get_mut(&req.user_id) {
        user.username = username;
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn get_recipe(State(state): State<Shared>, Path(name): Path<String>) -> Response {
    match lock(&state).recipes.get(&name) {
        Some(recipe) => Json(recipe.clone()).into_response(),
        None => error(StatusCode::NOT_FOUND, "recipe not found"),
    }
}

// ============================================================================
// Mock Service
// ============================================================================

/// Identity service served on an ephemeral local port.
pub struct MockService {
    pub base_url: String,
    pub state: Shared,
    handle: JoinHandle<()>,
}

impl MockService {
    /// Starts the service on 127.0.0.1 with a free port.
    pub async fn start() -> Result<Self> {
        let state: Shared = Arc::default();

        let app = Router::new()
            .route("/v1/auth/password", post(auth_password))
            .route("/v1/auth/token", post(auth_token))
            .route("/v1/auth/logout", post(logout))
            .route("/v1/accounts", post(create_account))
            .route("/v1/users/{id}", get(get_user).put(put_user).patch(patch_user))
            .route("/v1/usernames/{username}", put(claim_username))
            .route("/v1/recipes/{name}", get(get_recipe))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .context("Failed to bind mock service")?;
        let addr: SocketAddr = listener.local_addr()?;

        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            base_url: format!("http://{}", addr),
            state,
            handle,
        })
    }

    /// Registers a signed-up account owning `username`.
    pub fn add_user(&self, email: &str, password: &str, uid: &str, username: &str) {
        let mut state = lock(&self.state);
        state
            .accounts
            .insert(email.to_string(), (password.to_string(), uid.to_string()));
        state.users.insert(
            uid.to_string(),
            UserData {
                id: uid.to_string(),
                signed_up: true,
                username: username.to_string(),
                extra: Default::default(),
            },
        );
        state.usernames.insert(username.to_string(), uid.to_string());
    }

    /// Publishes a recipe.
    pub fn add_recipe(&self, recipe: RecipeData) {
        lock(&self.state).recipes.insert(recipe.name.clone(), recipe);
    }

    /// Returns a copy of a directory record.
    pub fn user(&self, id: &str) -> Option<UserData> {
        lock(&self.state).users.get(id).cloned()
    }
}

impl Drop for MockService {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use recipe_config::{ConfigStore, ExecutionContext};
    use recipe_config_sqlite::{ConfigPaths, SqliteConfigStore};
    use recipe_identity::{IdentityClient, DEFAULT_TIMEOUT};
    use recipe_session::{
        DirectoryError, ProviderError, SessionError, SessionManager, AUTH_CONFIG_KEY,
    };
    use recipe_store::{RecipeLookup, RecipeStoreError};
    use serde_json::Map;
    use tempfile::TempDir;

    const PROJECT: ExecutionContext = ExecutionContext::Project;

    /// One CLI process: its own client, config store and session manager.
    struct Process {
        config: Arc<SqliteConfigStore>,
        client: Arc<IdentityClient>,
        sessions: SessionManager,
    }

    impl Process {
        fn start(service: &MockService, dir: &TempDir) -> Self {
            let config = Arc::new(SqliteConfigStore::new(ConfigPaths::under(dir.path())));
            let client = Arc::new(IdentityClient::new(&service.base_url, DEFAULT_TIMEOUT).unwrap());
            let sessions = SessionManager::new(
                config.clone(),
                client.clone(),
                client.clone(),
                client.clone(),
            );
            Self {
                config,
                client,
                sessions,
            }
        }

        async fn persisted_auth(&self, context: ExecutionContext) -> Option<serde_json::Value> {
            self.config.get(AUTH_CONFIG_KEY, context).await.unwrap()
        }
    }

    fn recipe(name: &str) -> RecipeData {
        RecipeData {
            collaborators: Map::new(),
            created_at: 1_500_000_000,
            last_published_version: "2.1.0".into(),
            name: name.into(),
            scope: "public".into(),
            recipe_type: "gulp".into(),
            updated_at: 1_600_000_000,
        }
    }

    #[tokio::test]
    async fn test_complete_session_lifecycle() {
        let service = MockService::start().await.unwrap();
        let dir = TempDir::new().unwrap();

        // 1. Sign up in a first process
        let first = Process::start(&service, &dir);
        let user = first
            .sessions
            .sign_up(PROJECT, "Ann", "Ann@Example.com", "s3cret")
            .await
            .unwrap();

        assert_eq!(user.user_data().username, "ann");
        assert!(user.user_data().signed_up);
        assert_eq!(
            first.persisted_auth(PROJECT).await,
            Some(user.auth_data().to_object())
        );

        let record = service.user(&user.user_data().id).unwrap();
        assert!(record.signed_up);
        assert_eq!(record.username, "ann");

        // 2. A second process rehydrates the persisted session
        let second = Process::start(&service, &dir);
        let rehydrated = second.sessions.get_current_user(PROJECT).await.unwrap();
        assert_eq!(rehydrated.auth_data(), user.auth_data());
        assert_eq!(rehydrated.user_data().username, "ann");

        // 3. The persisted token is still valid
        second.sessions.auth(PROJECT).await.unwrap();
        assert!(second
            .client
            .session_token(&user.user_data().id)
            .await
            .is_some());

        // 4. Logout clears local state and revokes the provider session
        second.sessions.logout(PROJECT).await.unwrap();
        assert!(second.persisted_auth(PROJECT).await.is_none());
        assert!(second
            .client
            .session_token(&user.user_data().id)
            .await
            .is_none());
        assert!(matches!(
            second.sessions.get_current_user(PROJECT).await,
            Err(SessionError::NoAuthFound(_))
        ));
        assert!(!lock(&service.state)
            .tokens
            .contains_key(user.auth_data().token()));

        // 5. Login again with the lower-cased email
        let again = second
            .sessions
            .login(PROJECT, "ann@example.com", "s3cret")
            .await
            .unwrap();
        assert_eq!(again.user_data().id, user.user_data().id);
        assert_ne!(again.auth_data().token(), user.auth_data().token());
    }

    #[tokio::test]
    async fn test_logout_from_fresh_process_revokes_token() {
        let service = MockService::start().await.unwrap();
        service.add_user("bob@example.com", "pw", "u-bob", "bob");
        let dir = TempDir::new().unwrap();

        let first = Process::start(&service, &dir);
        let user = first
            .sessions
            .login(PROJECT, "bob@example.com", "pw")
            .await
            .unwrap();
        let token = user.auth_data().token().to_string();
        assert!(lock(&service.state).tokens.contains_key(&token));

        // A new invocation logs out without any prior auth call.
        let second = Process::start(&service, &dir);
        second.sessions.logout(PROJECT).await.unwrap();

        assert!(!lock(&service.state).tokens.contains_key(&token));
        assert!(second.persisted_auth(PROJECT).await.is_none());
    }

    #[tokio::test]
    async fn test_logout_revokes_only_the_contexts_token() {
        let service = MockService::start().await.unwrap();
        service.add_user("ann@example.com", "pw", "u-ann", "ann");
        service.add_user("bob@example.com", "pw", "u-bob", "bob");
        let dir = TempDir::new().unwrap();
        let process = Process::start(&service, &dir);

        let ann = process
            .sessions
            .login(PROJECT, "ann@example.com", "pw")
            .await
            .unwrap();
        let bob = process
            .sessions
            .login(ExecutionContext::User, "bob@example.com", "pw")
            .await
            .unwrap();

        process.sessions.logout(PROJECT).await.unwrap();

        {
            let state = lock(&service.state);
            assert!(!state.tokens.contains_key(ann.auth_data().token()));
            assert!(state.tokens.contains_key(bob.auth_data().token()));
        }
        assert!(process.client.session_token("u-ann").await.is_none());
        process.sessions.auth(ExecutionContext::User).await.unwrap();
    }

    #[tokio::test]
    async fn test_login_with_wrong_password() {
        let service = MockService::start().await.unwrap();
        service.add_user("bob@example.com", "right", "u-bob", "bob");
        let dir = TempDir::new().unwrap();
        let process = Process::start(&service, &dir);

        let result = process
            .sessions
            .login(PROJECT, "bob@example.com", "wrong")
            .await;

        assert!(matches!(
            result,
            Err(SessionError::Provider(ProviderError::InvalidCredentials))
        ));
        assert!(process.persisted_auth(PROJECT).await.is_none());
        assert!(!dir.path().join("project").join("config.db").exists());
    }

    #[tokio::test]
    async fn test_sign_up_with_taken_username() {
        let service = MockService::start().await.unwrap();
        service.add_user("bob@example.com", "pw", "u-bob", "bob");
        let dir = TempDir::new().unwrap();
        let process = Process::start(&service, &dir);

        let result = process
            .sessions
            .sign_up(PROJECT, "bob", "other@example.com", "pw")
            .await;

        assert!(matches!(
            result,
            Err(SessionError::Directory(DirectoryError::UsernameTaken(name))) if name == "bob"
        ));
        assert!(process.persisted_auth(PROJECT).await.is_none());

        // The account and its unclaimed record remain.
        let state = lock(&service.state);
        let (_, uid) = state.accounts.get("other@example.com").unwrap();
        let orphan = state.users.get(uid).unwrap();
        assert!(!orphan.signed_up);
        assert_eq!(state.usernames.get("bob").map(String::as_str), Some("u-bob"));
    }

    #[tokio::test]
    async fn test_sign_up_with_existing_email() {
        let service = MockService::start().await.unwrap();
        service.add_user("bob@example.com", "pw", "u-bob", "bob");
        let dir = TempDir::new().unwrap();
        let process = Process::start(&service, &dir);

        let result = process
            .sessions
            .sign_up(PROJECT, "robert", "Bob@Example.com", "pw")
            .await;

        assert!(matches!(
            result,
            Err(SessionError::Provider(ProviderError::EmailTaken(_)))
        ));
        assert!(!lock(&service.state).usernames.contains_key("robert"));
    }

    #[tokio::test]
    async fn test_scopes_are_isolated_on_disk() {
        let service = MockService::start().await.unwrap();
        service.add_user("bob@example.com", "pw", "u-bob", "bob");
        let dir = TempDir::new().unwrap();
        let process = Process::start(&service, &dir);

        process
            .sessions
            .login(ExecutionContext::User, "bob@example.com", "pw")
            .await
            .unwrap();

        assert!(dir.path().join("user").join("config.db").exists());
        assert!(!dir.path().join("project").join("config.db").exists());
        assert!(!dir.path().join("global").join("config.db").exists());

        assert!(matches!(
            process.sessions.get_current_user(PROJECT).await,
            Err(SessionError::NoAuthFound(ExecutionContext::Project))
        ));

        let fresh = Process::start(&service, &dir);
        let user = fresh
            .sessions
            .get_current_user(ExecutionContext::User)
            .await
            .unwrap();
        assert_eq!(user.user_data().username, "bob");
    }

    #[tokio::test]
    async fn test_recipe_lookup() {
        let service = MockService::start().await.unwrap();
        service.add_recipe(recipe("gulp-sass"));
        let dir = TempDir::new().unwrap();
        let process = Process::start(&service, &dir);
        let lookup = RecipeLookup::new(process.client.clone());

        let found = lookup.get("gulp-sass").await.unwrap().unwrap();
        assert_eq!(found, recipe("gulp-sass"));

        // Served from cache once the service forgets it.
        lock(&service.state).recipes.clear();
        assert!(lookup.get("gulp-sass").await.unwrap().is_some());

        assert!(lookup.get("unknown").await.unwrap().is_none());
        assert!(matches!(
            lookup.get("Bad Name").await,
            Err(RecipeStoreError::InvalidName(_))
        ));
    }

    #[tokio::test]
    async fn test_unresponsive_service_times_out() {
        // Accepted by the kernel backlog, never answered.
        let silent = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}", silent.local_addr().unwrap());

        let dir = TempDir::new().unwrap();
        let config = Arc::new(SqliteConfigStore::new(ConfigPaths::under(dir.path())));
        let client =
            Arc::new(IdentityClient::new(&base_url, Duration::from_millis(200)).unwrap());
        let sessions =
            SessionManager::new(config.clone(), client.clone(), client.clone(), client);

        let result = sessions.login(PROJECT, "a@b.com", "pw").await;

        assert!(matches!(
            result,
            Err(SessionError::Provider(ProviderError::Timeout))
        ));
        assert!(config.get(AUTH_CONFIG_KEY, PROJECT).await.unwrap().is_none());
    }
}
