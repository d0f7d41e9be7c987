//! Item types.

use crate::ValidationError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// A named, described entry in a user's collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Assigned at creation; unique within the owning user's collection.
    pub id: String,
    pub name: String,
    pub description: String,
}

/// Validated item contents. Both fields are non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFields {
    name: String,
    description: String,
}

impl ItemFields {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let name = name.into();
        let description = description.into();
        if name.is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if description.is_empty() {
            return Err(ValidationError::EmptyDescription);
        }
        Ok(Self { name, description })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("name".to_string(), Value::String(self.name.clone()));
        map.insert(
            "description".to_string(),
            Value::String(self.description.clone()),
        );
        map
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.to_map())
    }
}

/// Unsent edit of one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditDraft {
    pub item_id: String,
    pub name: String,
    pub description: String,
}

impl EditDraft {
    pub fn from_item(item: &Item) -> Self {
        Self {
            item_id: item.id.clone(),
            name: item.name.clone(),
            description: item.description.clone(),
        }
    }
}

/// Snapshot of the local mirror.
///
/// `loaded` stays false until the first fetch for the current session
/// completes, so an empty-but-loaded collection is distinguishable from one
/// that has not arrived yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorSnapshot {
    pub items: Arc<[Item]>,
    pub loaded: bool,
}

impl MirrorSnapshot {
    pub fn unloaded() -> Self {
        Self {
            items: Arc::from(Vec::new()),
            loaded: false,
        }
    }

    pub fn loaded(items: Vec<Item>) -> Self {
        Self {
            items: Arc::from(items),
            loaded: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

impl Default for MirrorSnapshot {
    fn default() -> Self {
        Self::unloaded()
    }
}
