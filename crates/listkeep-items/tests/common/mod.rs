//! Shared fixtures for item integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use listkeep_auth::{MemoryIdentityProvider, SessionManager};
use listkeep_items::{
    ItemRepository, ItemStoreClient, MemoryRealtimeStore, RealtimeStore, StoreResult,
};
use listkeep_storage::{MemoryStorage, SecretsManager};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Notify, Semaphore};

/// Store wrapper that records every call as `"<op> <path>"`.
pub struct RecordingStore {
    inner: MemoryRealtimeStore,
    calls: Mutex<Vec<String>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryRealtimeStore::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn inner(&self) -> &MemoryRealtimeStore {
        &self.inner
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    fn record(&self, op: &str, path: &str) {
        self.calls.lock().push(format!("{op} {path}"));
    }
}

#[async_trait]
impl RealtimeStore for RecordingStore {
    async fn set(&self, path: &str, value: Value) -> StoreResult<()> {
        self.record("set", path);
        self.inner.set(path, value).await
    }

    async fn get(&self, path: &str) -> StoreResult<Option<Value>> {
        self.record("get", path);
        self.inner.get(path).await
    }

    async fn update(&self, path: &str, fields: Map<String, Value>) -> StoreResult<()> {
        self.record("update", path);
        self.inner.update(path, fields).await
    }

    async fn remove(&self, path: &str) -> StoreResult<()> {
        self.record("remove", path);
        self.inner.remove(path).await
    }
}

/// Store wrapper whose reads can be held open.
///
/// While closed, `get` reads the tree immediately but does not return until
/// the test releases it.
pub struct GatedStore {
    inner: MemoryRealtimeStore,
    closed: AtomicBool,
    permits: Semaphore,
    entered: Notify,
}

impl GatedStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryRealtimeStore::new(),
            closed: AtomicBool::new(false),
            permits: Semaphore::new(0),
            entered: Notify::new(),
        }
    }

    pub fn inner(&self) -> &MemoryRealtimeStore {
        &self.inner
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Let one held read return.
    pub fn release_one(&self) {
        self.permits.add_permits(1);
    }

    /// Wait until a read is being held.
    pub async fn wait_until_held(&self) {
        self.entered.notified().await;
    }
}

#[async_trait]
impl RealtimeStore for GatedStore {
    async fn set(&self, path: &str, value: Value) -> StoreResult<()> {
        self.inner.set(path, value).await
    }

    async fn get(&self, path: &str) -> StoreResult<Option<Value>> {
        let value = self.inner.get(path).await;
        if self.closed.load(Ordering::SeqCst) {
            self.entered.notify_one();
            self.permits
                .acquire()
                .await
                .expect("gate semaphore closed")
                .forget();
        }
        value
    }

    async fn update(&self, path: &str, fields: Map<String, Value>) -> StoreResult<()> {
        self.inner.update(path, fields).await
    }

    async fn remove(&self, path: &str) -> StoreResult<()> {
        self.inner.remove(path).await
    }
}

pub fn session_manager() -> Arc<SessionManager> {
    Arc::new(SessionManager::new(
        Arc::new(MemoryIdentityProvider::new()),
        SecretsManager::new(Box::new(MemoryStorage::new())),
    ))
}

pub fn client_for(store: Arc<dyn RealtimeStore>) -> ItemStoreClient {
    ItemStoreClient::new(
        ItemRepository::new(store),
        tokio::runtime::Handle::current(),
    )
}
