//! Stateless item operations addressed by user ID.
//!
//! Layout: `users/{user_id}/items/{item_id}` holding `{name, description}`.

use crate::{Item, ItemFields, ItemIdGenerator, ItemResult, RealtimeStore, ValidationError};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

const RESERVED_KEY_CHARS: &[char] = &['/', '.', '#', '$', '[', ']'];

/// Leaf record as stored. Missing fields read as empty strings.
#[derive(Debug, Deserialize)]
struct StoredItem {
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
}

fn check_key(key: &str) -> Result<(), ValidationError> {
    if key.is_empty() || key.contains(RESERVED_KEY_CHARS) {
        return Err(ValidationError::InvalidKey(key.to_string()));
    }
    Ok(())
}

pub fn items_path(user_id: &str) -> String {
    format!("users/{user_id}/items")
}

pub fn item_path(user_id: &str, item_id: &str) -> String {
    format!("users/{user_id}/items/{item_id}")
}

/// Turn the collection node into items ordered by ID.
fn parse_collection(user_id: &str, node: Option<Value>) -> Vec<Item> {
    let entries = match node {
        None => return Vec::new(),
        Some(Value::Object(entries)) => entries,
        Some(other) => {
            warn!(user_id = %user_id, kind = %value_kind(&other), "Item collection is not an object, ignoring");
            return Vec::new();
        }
    };

    let mut items: Vec<Item> = entries
        .into_iter()
        .filter_map(|(id, value)| match serde_json::from_value::<StoredItem>(value) {
            Ok(stored) => Some(Item {
                id,
                name: stored.name,
                description: stored.description,
            }),
            Err(e) => {
                warn!(user_id = %user_id, item_id = %id, error = %e, "Skipping malformed item");
                None
            }
        })
        .collect();

    items.sort_by(|a, b| compare_ids(&a.id, &b.id));
    items
}

/// Numeric IDs compare numerically and sort before any others.
fn compare_ids(a: &str, b: &str) -> std::cmp::Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        (Ok(_), Err(_)) => std::cmp::Ordering::Less,
        (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Create/list/update/delete for any user's collection.
///
/// Holds no per-user state; the only state is the ID generator.
pub struct ItemRepository {
    store: Arc<dyn RealtimeStore>,
    ids: ItemIdGenerator,
}

impl ItemRepository {
    pub fn new(store: Arc<dyn RealtimeStore>) -> Self {
        Self {
            store,
            ids: ItemIdGenerator::new(),
        }
    }

    /// Store a new item under a fresh ID and return the ID.
    pub async fn create(&self, user_id: &str, fields: &ItemFields) -> ItemResult<String> {
        check_key(user_id)?;
        let item_id = self.ids.next_id();
        self.store
            .set(&item_path(user_id, &item_id), fields.to_json())
            .await?;
        debug!(user_id = %user_id, item_id = %item_id, "Item created");
        Ok(item_id)
    }

    /// The user's whole collection, ordered by ID. Empty when the user has
    /// no items.
    pub async fn list(&self, user_id: &str) -> ItemResult<Vec<Item>> {
        check_key(user_id)?;
        let node = self.store.get(&items_path(user_id)).await?;
        let items = parse_collection(user_id, node);
        debug!(user_id = %user_id, count = items.len(), "Items listed");
        Ok(items)
    }

    /// Overwrite name and description. Does not check that the item exists.
    pub async fn update(&self, user_id: &str, item_id: &str, fields: &ItemFields) -> ItemResult<()> {
        check_key(user_id)?;
        check_key(item_id)?;
        self.store
            .update(&item_path(user_id, item_id), fields.to_map())
            .await?;
        debug!(user_id = %user_id, item_id = %item_id, "Item updated");
        Ok(())
    }

    /// Delete an item. Deleting a missing item succeeds.
    pub async fn delete(&self, user_id: &str, item_id: &str) -> ItemResult<()> {
        check_key(user_id)?;
        check_key(item_id)?;
        self.store.remove(&item_path(user_id, item_id)).await?;
        debug!(user_id = %user_id, item_id = %item_id, "Item deleted");
        Ok(())
    }
}
