//! In-process session cache.

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::{CurrentUser, ExecutionContext};

/// Current user per execution context, for the lifetime of the process.
///
/// An entry means the context authenticated (or rehydrated) during this run.
/// A missing entry only means the persisted config has not been consulted yet.
#[derive(Debug, Default)]
pub struct SessionCache {
    users: RwLock<HashMap<ExecutionContext, CurrentUser>>,
}

impl SessionCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached user of a context.
    pub async fn get(&self, context: ExecutionContext) -> Option<CurrentUser> {
        self.users.read().await.get(&context).cloned()
    }

    /// Caches the user of a context, replacing any previous one.
    pub async fn put(&self, context: ExecutionContext, user: CurrentUser) {
        self.users.write().await.insert(context, user);
    }

    /// Removes the user of a context.
    pub async fn remove(&self, context: ExecutionContext) -> Option<CurrentUser> {
        self.users.write().await.remove(&context)
    }

    #[cfg(test)]
    pub(crate) async fn contains(&self, context: ExecutionContext) -> bool {
        self.users.read().await.contains_key(&context)
    }
}
