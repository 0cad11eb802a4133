//! Session value types.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Authentication result as returned by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAuth {
    /// Opaque session token.
    pub token: String,
    /// Subject (account) id the token was issued for.
    pub uid: String,
    /// Provider that issued the token (e.g. "password", "custom").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Token expiration (Unix seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<u64>,
}

/// Token and subject id of a successful authentication.
///
/// Persisted under the `auth` config key as `{"token", "subjectId"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthData {
    token: String,
    subject_id: String,
}

impl AuthData {
    /// Creates auth data from its parts.
    pub fn new(token: impl Into<String>, subject_id: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            subject_id: subject_id.into(),
        }
    }

    /// Reconstructs auth data from its persisted record.
    pub fn from_object(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Returns the opaque session token.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Returns the subject id the token belongs to.
    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    /// Returns the plain record persisted in config.
    pub fn to_object(&self) -> Value {
        json!({
            "token": self.token,
            "subjectId": self.subject_id,
        })
    }
}

impl From<RawAuth> for AuthData {
    fn from(raw: RawAuth) -> Self {
        Self::new(raw.token, raw.uid)
    }
}

/// Snapshot of a directory user record.
///
/// Not re-synced after it was read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    /// Subject id of the user.
    pub id: String,
    /// Whether signup completed (username claimed).
    #[serde(default)]
    pub signed_up: bool,
    /// Claimed username, empty until signup completes.
    #[serde(default)]
    pub username: String,
    /// Any other fields stored on the record.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserData {
    /// Minimal record written at the start of signup.
    pub fn unclaimed(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            signed_up: false,
            username: String::new(),
            extra: Map::new(),
        }
    }
}

/// Partial update of a directory user record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    /// New signup state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signed_up: Option<bool>,
}

impl UserPatch {
    /// Patch that only sets `signedUp`.
    pub fn signed_up(signed_up: bool) -> Self {
        Self {
            signed_up: Some(signed_up),
        }
    }

    /// Applies the patch to a record.
    pub fn apply(&self, user: &mut UserData) {
        if let Some(signed_up) = self.signed_up {
            user.signed_up = signed_up;
        }
    }
}

/// The user this process is acting as in one execution context.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentUser {
    user_data: UserData,
    auth_data: AuthData,
}

impl CurrentUser {
    pub(crate) fn new(user_data: UserData, auth_data: AuthData) -> Self {
        Self {
            user_data,
            auth_data,
        }
    }

    /// Returns the directory record of the user.
    pub fn user_data(&self) -> &UserData {
        &self.user_data
    }

    /// Returns the authentication backing the session.
    pub fn auth_data(&self) -> &AuthData {
        &self.auth_data
    }
}
