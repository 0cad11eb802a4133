//! Recipe metadata.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Metadata of a published recipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeData {
    /// Collaborators keyed by user id.
    #[serde(default)]
    pub collaborators: Map<String, Value>,
    /// Creation time (Unix milliseconds).
    pub created_at: u64,
    /// Most recently published version.
    #[serde(default)]
    pub last_published_version: String,
    /// Recipe name.
    pub name: String,
    /// Owning scope.
    #[serde(default)]
    pub scope: String,
    /// Recipe type.
    #[serde(rename = "type", default)]
    pub recipe_type: String,
    /// Last update time (Unix milliseconds).
    pub updated_at: u64,
}

impl RecipeData {
    /// Returns the plain record form of the recipe.
    pub fn to_object(&self) -> Value {
        let mut object = Map::new();
        object.insert(
            "collaborators".into(),
            Value::Object(self.collaborators.clone()),
        );
        object.insert("createdAt".into(), self.created_at.into());
        object.insert(
            "lastPublishedVersion".into(),
            self.last_published_version.clone().into(),
        );
        object.insert("name".into(), self.name.clone().into());
        object.insert("scope".into(), self.scope.clone().into());
        object.insert("type".into(), self.recipe_type.clone().into());
        object.insert("updatedAt".into(), self.updated_at.into());
        Value::Object(object)
    }
}
