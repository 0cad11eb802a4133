//! In-memory config store.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::{validate_key, ConfigError, ConfigStore, DeleteResult, ExecutionContext};

/// Config store keeping every scope in a `HashMap`.
///
/// Nothing survives the process. Suitable for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    scopes: RwLock<HashMap<ExecutionContext, HashMap<String, Value>>>,
}

impl MemoryConfigStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn scope_exists(&self, context: ExecutionContext) -> Result<bool, ConfigError> {
        Ok(self.scopes.read().await.contains_key(&context))
    }

    async fn get(
        &self,
        key: &str,
        context: ExecutionContext,
    ) -> Result<Option<Value>, ConfigError> {
        validate_key(key)?;

        let scopes = self.scopes.read().await;
        Ok(scopes.get(&context).and_then(|scope| scope.get(key)).cloned())
    }

    async fn set(
        &self,
        key: &str,
        value: &Value,
        context: ExecutionContext,
    ) -> Result<(), ConfigError> {
        validate_key(key)?;

        let mut scopes = self.scopes.write().await;
        scopes
            .entry(context)
            .or_default()
            .insert(key.to_string(), value.clone());
        Ok(())
    }

    async fn delete(
        &self,
        key: &str,
        context: ExecutionContext,
    ) -> Result<DeleteResult, ConfigError> {
        validate_key(key)?;

        let mut scopes = self.scopes.write().await;
        let Some(scope) = scopes.get_mut(&context) else {
            return Ok(DeleteResult::missing_scope(context, key));
        };

        let value = scope.remove(key);
        Ok(DeleteResult {
            context,
            exists: true,
            deleted: value.is_some(),
            key: key.to_string(),
            value,
        })
    }
}
