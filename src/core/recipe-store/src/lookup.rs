//! Cached recipe lookup.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::{RecipeData, RecipeStoreCache, RecipeStoreError};

/// Maximum length of a recipe name.
const MAX_NAME_LEN: usize = 214;

/// Remote store of published recipes.
#[async_trait]
pub trait RecipeStore: Send + Sync {
    /// Fetches a recipe by name; `None` if it does not exist.
    async fn get_recipe(&self, name: &str) -> Result<Option<RecipeData>, RecipeStoreError>;
}

/// Validates a recipe name.
///
/// Only allows: lowercase letters, digits, dot, underscore, hyphen.
pub fn validate_recipe_name(name: &str) -> Result<(), RecipeStoreError> {
    if name.is_empty() {
        return Err(RecipeStoreError::InvalidName("name cannot be empty".into()));
    }

    if name.len() > MAX_NAME_LEN {
        return Err(RecipeStoreError::InvalidName("name too long".into()));
    }

    if name.starts_with('.') || name.starts_with('_') {
        return Err(RecipeStoreError::InvalidName(format!(
            "{name} cannot start with . or _"
        )));
    }

    let valid = name.chars().all(|c| {
        c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '_' || c == '-'
    });

    if !valid {
        return Err(RecipeStoreError::InvalidName(format!(
            "{name} must match [a-z0-9._-]+"
        )));
    }

    Ok(())
}

/// Recipe lookup through a [`RecipeStoreCache`].
pub struct RecipeLookup {
    store: Arc<dyn RecipeStore>,
    cache: RwLock<RecipeStoreCache>,
}

impl RecipeLookup {
    /// Creates a lookup with an empty cache.
    pub fn new(store: Arc<dyn RecipeStore>) -> Self {
        Self {
            store,
            cache: RwLock::new(RecipeStoreCache::new()),
        }
    }

    /// Returns a recipe, fetching and caching it on a miss.
    ///
    /// Missing recipes are not cached.
    pub async fn get(&self, name: &str) -> Result<Option<RecipeData>, RecipeStoreError> {
        validate_recipe_name(name)?;

        if let Some(recipe) = self.cache.read().await.get_recipe(name) {
            return Ok(Some(recipe.clone()));
        }

        let recipe = self.store.get_recipe(name).await?;
        if let Some(recipe) = &recipe {
            self.cache.write().await.set_recipe(name, recipe.clone());
            debug!(name = name, version = %recipe.last_published_version, "Recipe cached");
        }
        Ok(recipe)
    }
}
