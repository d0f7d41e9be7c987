//! Realtime data store seam.
//!
//! The store is a JSON tree addressed by slash-separated paths. A node that
//! holds nothing does not exist: reading it yields `None`, and removing the
//! last child of a node removes the node.

mod memory;
mod rest;

pub use memory::MemoryRealtimeStore;
pub use rest::RestRealtimeStore;

use crate::StoreResult;
use async_trait::async_trait;
use serde_json::{Map, Value};

#[async_trait]
pub trait RealtimeStore: Send + Sync {
    /// Replace the node at `path`, creating parents as needed.
    async fn set(&self, path: &str, value: Value) -> StoreResult<()>;

    /// Read the node at `path`.
    async fn get(&self, path: &str) -> StoreResult<Option<Value>>;

    /// Shallow-merge `fields` into the node at `path`.
    async fn update(&self, path: &str, fields: Map<String, Value>) -> StoreResult<()>;

    /// Delete the node at `path`. Removing a missing node succeeds.
    async fn remove(&self, path: &str) -> StoreResult<()>;
}
