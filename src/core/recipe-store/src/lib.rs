//! # Recipe Store
//!
//! Recipe metadata as published in the registry, and a per-process cache
//! in front of the remote store.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cache;
pub mod data;
pub mod error;
pub mod lookup;

pub use cache::RecipeStoreCache;
pub use data::RecipeData;
pub use error::RecipeStoreError;
pub use lookup::{validate_recipe_name, RecipeLookup, RecipeStore};
