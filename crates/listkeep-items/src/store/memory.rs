//! In-process realtime store.

use super::RealtimeStore;
use crate::{StoreError, StoreResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// JSON tree held behind a mutex.
///
/// `update` on a missing node does nothing (the hosted store would create
/// it).
pub struct MemoryRealtimeStore {
    root: Mutex<Value>,
    unavailable: AtomicBool,
}

impl Default for MemoryRealtimeStore {
    fn default() -> Self {
        Self {
            root: Mutex::new(Value::Object(Map::new())),
            unavailable: AtomicBool::new(false),
        }
    }
}

impl MemoryRealtimeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every operation fails with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Copy of the whole tree.
    pub fn snapshot(&self) -> Value {
        self.root.lock().clone()
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store offline".to_string()));
        }
        Ok(())
    }
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

fn is_vacant(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn set_at(node: &mut Value, segments: &[&str], value: Value) {
    match segments.split_first() {
        None => *node = value,
        Some((head, rest)) => {
            if !node.is_object() {
                *node = Value::Object(Map::new());
            }
            if let Value::Object(map) = node {
                let child = map.entry(head.to_string()).or_insert(Value::Null);
                set_at(child, rest, value);
            }
        }
    }
}

/// Remove the node under `segments`. Returns true when `node` is left empty
/// and should be pruned by its parent.
fn remove_at(node: &mut Value, segments: &[&str]) -> bool {
    match segments.split_first() {
        None => {
            *node = Value::Null;
            true
        }
        Some((head, rest)) => {
            let Value::Object(map) = node else {
                return false;
            };
            let Some(child) = map.get_mut(*head) else {
                return false;
            };
            if remove_at(child, rest) {
                map.remove(*head);
            }
            map.is_empty()
        }
    }
}

fn node_at<'a>(root: &'a Value, segments: &[&str]) -> Option<&'a Value> {
    segments
        .iter()
        .try_fold(root, |node, segment| node.get(*segment))
}

fn node_at_mut<'a>(root: &'a mut Value, segments: &[&str]) -> Option<&'a mut Value> {
    segments
        .iter()
        .try_fold(root, |node, segment| node.get_mut(*segment))
}

#[async_trait]
impl RealtimeStore for MemoryRealtimeStore {
    async fn set(&self, path: &str, value: Value) -> StoreResult<()> {
        self.check_available()?;
        let segments = segments(path);
        let mut root = self.root.lock();

        if is_vacant(&value) {
            remove_at(&mut root, &segments);
        } else {
            set_at(&mut root, &segments, value);
        }
        if root.is_null() {
            *root = Value::Object(Map::new());
        }
        Ok(())
    }

    async fn get(&self, path: &str) -> StoreResult<Option<Value>> {
        self.check_available()?;
        let root = self.root.lock();
        Ok(node_at(&root, &segments(path))
            .filter(|node| !is_vacant(node))
            .cloned())
    }

    async fn update(&self, path: &str, fields: Map<String, Value>) -> StoreResult<()> {
        self.check_available()?;
        let mut root = self.root.lock();

        let Some(Value::Object(node)) = node_at_mut(&mut root, &segments(path)) else {
            debug!(path = %path, "Update of missing node ignored");
            return Ok(());
        };
        for (key, value) in fields {
            if value.is_null() {
                node.remove(&key);
            } else {
                node.insert(key, value);
            }
        }
        Ok(())
    }

    async fn remove(&self, path: &str) -> StoreResult<()> {
        self.check_available()?;
        let mut root = self.root.lock();
        remove_at(&mut root, &segments(path));
        if root.is_null() {
            *root = Value::Object(Map::new());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_set_creates_parents() {
        let store = MemoryRealtimeStore::new();
        store
            .set("users/u1/items/1", json!({ "name": "Milk" }))
            .await
            .unwrap();

        assert_eq!(
            store.get("users/u1/items").await.unwrap(),
            Some(json!({ "1": { "name": "Milk" } }))
        );
        assert_eq!(store.get("users/u2/items").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_remove_prunes_empty_parents() {
        let store = MemoryRealtimeStore::new();
        store.set("users/u1/items/1", json!({ "name": "Milk" })).await.unwrap();

        store.remove("users/u1/items/1").await.unwrap();
        assert_eq!(store.get("users/u1/items").await.unwrap(), None);
        assert_eq!(store.snapshot(), json!({}));
    }

    #[tokio::test]
    async fn test_remove_missing_is_noop() {
        let store = MemoryRealtimeStore::new();
        store.set("users/u1/items/1", json!({ "name": "Milk" })).await.unwrap();

        store.remove("users/u1/items/404").await.unwrap();
        store.remove("nowhere/at/all").await.unwrap();
        assert!(store.get("users/u1/items/1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_update_merges_shallowly() {
        let store = MemoryRealtimeStore::new();
        store
            .set("a/b", json!({ "name": "Milk", "description": "2 liters" }))
            .await
            .unwrap();

        store
            .update("a/b", fields(json!({ "description": "3 liters" })))
            .await
            .unwrap();
        assert_eq!(
            store.get("a/b").await.unwrap(),
            Some(json!({ "name": "Milk", "description": "3 liters" }))
        );
    }

    #[tokio::test]
    async fn test_update_missing_node_is_noop() {
        let store = MemoryRealtimeStore::new();
        store
            .update("a/b", fields(json!({ "name": "Ghost" })))
            .await
            .unwrap();
        assert_eq!(store.get("a/b").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_null_removes() {
        let store = MemoryRealtimeStore::new();
        store.set("a/b", json!(1)).await.unwrap();
        store.set("a/b", Value::Null).await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unavailable_fails_every_operation() {
        let store = MemoryRealtimeStore::new();
        store.set_unavailable(true);

        assert!(matches!(
            store.get("a").await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(store.set("a", json!(1)).await.is_err());
        assert!(store.remove("a").await.is_err());

        store.set_unavailable(false);
        assert!(store.get("a").await.unwrap().is_none());
    }
}
