//! Config store trait definition.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::{ConfigError, ContextOptions, ExecutionContext};

/// Maximum length of a config key.
const MAX_KEY_LEN: usize = 128;

/// Outcome of deleting a key in one scope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeleteResult {
    /// Scope the delete ran against.
    pub context: ExecutionContext,
    /// Whether any configuration exists for the scope.
    pub exists: bool,
    /// Whether a value was removed.
    pub deleted: bool,
    /// Key that was deleted.
    pub key: String,
    /// The removed value, if any.
    pub value: Option<Value>,
}

impl DeleteResult {
    /// Result for a scope that holds no configuration at all.
    pub fn missing_scope(context: ExecutionContext, key: &str) -> Self {
        Self {
            context,
            exists: false,
            deleted: false,
            key: key.to_string(),
            value: None,
        }
    }
}

/// Storage trait for scoped configuration values.
///
/// Implementors provide the single-scope operations; the `*_config` methods
/// apply them across a [`ContextOptions`] selection.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Check whether any configuration exists for a scope.
    async fn scope_exists(&self, context: ExecutionContext) -> Result<bool, ConfigError>;

    /// Get a value by key in one scope.
    async fn get(&self, key: &str, context: ExecutionContext)
        -> Result<Option<Value>, ConfigError>;

    /// Set a value in one scope, creating the scope if needed.
    async fn set(
        &self,
        key: &str,
        value: &Value,
        context: ExecutionContext,
    ) -> Result<(), ConfigError>;

    /// Delete a key in one scope.
    async fn delete(&self, key: &str, context: ExecutionContext)
        -> Result<DeleteResult, ConfigError>;

    /// Get a value from the selected scopes.
    ///
    /// Scopes are consulted from most to least specific and the first value
    /// found is returned.
    async fn get_config(
        &self,
        key: &str,
        options: &ContextOptions,
    ) -> Result<Option<Value>, ConfigError> {
        for context in options.contexts().into_iter().rev() {
            if let Some(value) = self.get(key, context).await? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    /// Set a value in every selected scope.
    async fn set_config(
        &self,
        key: &str,
        value: &Value,
        options: &ContextOptions,
    ) -> Result<(), ConfigError> {
        for context in options.contexts() {
            self.set(key, value, context).await?;
        }
        Ok(())
    }

    /// Delete a key from every selected scope.
    async fn delete_config(
        &self,
        key: &str,
        options: &ContextOptions,
    ) -> Result<Vec<DeleteResult>, ConfigError> {
        let mut results = Vec::new();
        for context in options.contexts() {
            results.push(self.delete(key, context).await?);
        }
        Ok(results)
    }
}

/// Validates that a config key is safe to store.
///
/// Only allows: ASCII letters, digits, dot, underscore, hyphen.
pub fn validate_key(key: &str) -> Result<(), ConfigError> {
    if key.is_empty() {
        return Err(ConfigError::InvalidKey("key cannot be empty".into()));
    }

    if key.len() > MAX_KEY_LEN {
        return Err(ConfigError::InvalidKey("key too long".into()));
    }

    let valid = key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-');

    if !valid {
        return Err(ConfigError::InvalidKey(format!(
            "{key} must match [A-Za-z0-9._-]+"
        )));
    }

    Ok(())
}
