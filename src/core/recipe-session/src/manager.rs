//! Session manager.
//!
//! Orchestrates login, logout, signup and rehydration by composing the
//! identity provider, the user directory, the config store and the
//! [`SessionCache`].
//!
//! Every chain is strictly sequential and stops at the first failure.
//! Effects of completed steps are not rolled back.

use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use recipe_config::{ConfigError, ConfigStore, ContextOptions, ExecutionContext};

use crate::{
    AuthData, Credentials, CurrentUser, Directory, IdentityProvider, SessionCache, SessionError,
    UserData, UserPatch, UsernameRegistry,
};

/// Config key holding the persisted auth record.
pub const AUTH_CONFIG_KEY: &str = "auth";

/// Establishes, caches, persists and tears down sessions per execution context.
///
/// Constructed once by the entry point and shared with every command.
/// Mutations (`login`, `logout`, `sign_up`, rehydration) of the same context
/// are serialized; different contexts proceed independently.
pub struct SessionManager {
    config: Arc<dyn ConfigStore>,
    identity: Arc<dyn IdentityProvider>,
    directory: Arc<dyn Directory>,
    usernames: Arc<dyn UsernameRegistry>,
    cache: SessionCache,
    locks: [Mutex<()>; 3],
}

impl SessionManager {
    /// Creates a session manager over its collaborators.
    pub fn new(
        config: Arc<dyn ConfigStore>,
        identity: Arc<dyn IdentityProvider>,
        directory: Arc<dyn Directory>,
        usernames: Arc<dyn UsernameRegistry>,
    ) -> Self {
        Self {
            config,
            identity,
            directory,
            usernames,
            cache: SessionCache::new(),
            locks: [Mutex::new(()), Mutex::new(()), Mutex::new(())],
        }
    }

    #[cfg(test)]
    pub(crate) fn cache(&self) -> &SessionCache {
        &self.cache
    }

    /// Returns the cached user of a context without any I/O.
    pub async fn cached_user(&self, context: ExecutionContext) -> Option<CurrentUser> {
        self.cache.get(context).await
    }

    /// Resolves the current user of a context.
    ///
    /// Order: session cache, then the persisted `auth` record (rehydrated
    /// through the directory and cached), else [`SessionError::NoAuthFound`].
    /// Never authenticates against the identity provider.
    pub async fn get_current_user(
        &self,
        context: ExecutionContext,
    ) -> Result<CurrentUser, SessionError> {
        if let Some(user) = self.cache.get(context).await {
            return Ok(user);
        }

        let _guard = self.lock(context).await;

        // A concurrent call may have rehydrated while we waited.
        if let Some(user) = self.cache.get(context).await {
            return Ok(user);
        }

        let auth_data = self.get_auth_data(context).await?;
        let current_user = self.build_current_user(auth_data).await?;
        self.cache.put(context, current_user.clone()).await;

        debug!(context = %context, uid = %current_user.user_data().id, "Session rehydrated");
        Ok(current_user)
    }

    /// Re-asserts the current session against the identity provider.
    pub async fn auth(&self, context: ExecutionContext) -> Result<(), SessionError> {
        let current_user = self.get_current_user(context).await?;
        self.identity
            .auth_with_custom_token(current_user.auth_data().token())
            .await?;

        debug!(context = %context, provider = self.identity.name(), "Session re-asserted");
        Ok(())
    }

    /// Logs in with email and password.
    ///
    /// Authenticates, reads the user record, then persists and caches the
    /// session for the context.
    pub async fn login(
        &self,
        context: ExecutionContext,
        email: &str,
        password: &str,
    ) -> Result<CurrentUser, SessionError> {
        let _guard = self.lock(context).await;

        let credentials = Credentials::new(email, password);
        let auth_data = self.auth_with_password(&credentials).await?;
        let current_user = self.build_current_user(auth_data).await?;
        let current_user = self.set_current_user(context, current_user).await?;

        info!(context = %context, uid = %current_user.user_data().id, "Logged in");
        Ok(current_user)
    }

    /// Logs out of a context.
    ///
    /// Ends the provider session of the context's own token, taken from the
    /// cache or else from the persisted record, without rehydrating. A
    /// context without a session skips the provider.
    ///
    /// Local cleanup (persisted record, then cache entry) runs once the
    /// provider sign-out settled, whatever its outcome. A cleanup failure is
    /// returned first; otherwise a sign-out failure is returned.
    pub async fn logout(&self, context: ExecutionContext) -> Result<(), SessionError> {
        let _guard = self.lock(context).await;

        let unauth = match self.session_token(context).await? {
            Some(token) => self.identity.unauth(&token).await,
            None => Ok(()),
        };
        if let Err(e) = &unauth {
            warn!(context = %context, error = %e, "Provider sign-out failed");
        }

        self.delete_current_user(context).await?;
        unauth?;

        info!(context = %context, "Logged out");
        Ok(())
    }

    /// Creates an account, claims its username and logs it in.
    ///
    /// `username` and `email` are lower-cased. Steps: create account,
    /// authenticate, write the unclaimed user record, claim the username and
    /// mark the record signed up, then persist and cache the session.
    /// A failure leaves earlier steps in place.
    pub async fn sign_up(
        &self,
        context: ExecutionContext,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<CurrentUser, SessionError> {
        let username = username.to_lowercase();
        let credentials = Credentials::new(email.to_lowercase(), password);

        let _guard = self.lock(context).await;

        let created = self.identity.create_user(&credentials).await?;
        debug!(uid = %created.uid, "Account created");

        let auth_data = self.auth_with_password(&credentials).await?;

        let user = UserData::unclaimed(created.uid.clone());
        self.directory.set(&user.id, &user).await?;
        debug!(uid = %user.id, "User record written");

        self.complete_sign_up_with_username(&user, &username).await?;

        let current_user = self.build_current_user(auth_data).await?;
        let current_user = self.set_current_user(context, current_user).await?;

        info!(context = %context, uid = %created.uid, username = %username, "Signed up");
        Ok(current_user)
    }

    /// Claims `username` for `user`, then marks the record signed up.
    pub async fn complete_sign_up_with_username(
        &self,
        user: &UserData,
        username: &str,
    ) -> Result<(), SessionError> {
        self.usernames.change_users_username(user, username).await?;
        debug!(uid = %user.id, username = %username, "Username claimed");

        self.directory
            .update(&user.id, &UserPatch::signed_up(true))
            .await?;
        Ok(())
    }

    async fn lock(&self, context: ExecutionContext) -> MutexGuard<'_, ()> {
        self.locks[context.index()].lock().await
    }

    async fn auth_with_password(
        &self,
        credentials: &Credentials,
    ) -> Result<AuthData, SessionError> {
        let raw = self.identity.auth_with_password(credentials).await?;
        Ok(AuthData::from(raw))
    }

    async fn build_current_user(&self, auth_data: AuthData) -> Result<CurrentUser, SessionError> {
        let user_data = self.directory.get(auth_data.subject_id()).await?;
        Ok(CurrentUser::new(user_data, auth_data))
    }

    async fn get_auth_data(&self, context: ExecutionContext) -> Result<AuthData, SessionError> {
        let record = self
            .config
            .get_config(AUTH_CONFIG_KEY, &ContextOptions::only(context))
            .await?;

        match record {
            None | Some(serde_json::Value::Null) => Err(SessionError::NoAuthFound(context)),
            Some(value) => AuthData::from_object(value).map_err(|e| {
                SessionError::Config(ConfigError::Serialization(format!(
                    "malformed auth record: {e}"
                )))
            }),
        }
    }

    /// Returns the token of a context's session without any directory call.
    ///
    /// An undecodable persisted record has no usable token.
    async fn session_token(
        &self,
        context: ExecutionContext,
    ) -> Result<Option<String>, SessionError> {
        if let Some(user) = self.cache.get(context).await {
            return Ok(Some(user.auth_data().token().to_string()));
        }

        match self.get_auth_data(context).await {
            Ok(auth_data) => Ok(Some(auth_data.token().to_string())),
            Err(SessionError::NoAuthFound(_)) => Ok(None),
            Err(SessionError::Config(ConfigError::Serialization(e))) => {
                warn!(context = %context, error = %e, "Ignoring unreadable auth record");
                Ok(None)
            },
            Err(e) => Err(e),
        }
    }

    async fn set_current_user(
        &self,
        context: ExecutionContext,
        current_user: CurrentUser,
    ) -> Result<CurrentUser, SessionError> {
        self.config
            .set_config(
                AUTH_CONFIG_KEY,
                &current_user.auth_data().to_object(),
                &ContextOptions::only(context),
            )
            .await?;
        self.cache.put(context, current_user.clone()).await;
        Ok(current_user)
    }

    async fn delete_current_user(&self, context: ExecutionContext) -> Result<(), SessionError> {
        self.config
            .delete_config(AUTH_CONFIG_KEY, &ContextOptions::only(context))
            .await?;
        self.cache.remove(context).await;
        Ok(())
    }
}
