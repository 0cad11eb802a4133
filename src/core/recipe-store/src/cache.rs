//! Recipe cache.

use std::collections::HashMap;

use crate::RecipeData;

/// Recipes already fetched in this process, keyed by name.
#[derive(Debug, Default)]
pub struct RecipeStoreCache {
    recipes: HashMap<String, RecipeData>,
}

impl RecipeStoreCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a cached recipe.
    pub fn get_recipe(&self, name: &str) -> Option<&RecipeData> {
        self.recipes.get(name)
    }

    /// Returns true if the recipe is cached.
    pub fn has_recipe(&self, name: &str) -> bool {
        self.recipes.contains_key(name)
    }

    /// Caches a recipe under a name.
    pub fn set_recipe(&mut self, name: impl Into<String>, recipe: RecipeData) {
        self.recipes.insert(name.into(), recipe);
    }
}
