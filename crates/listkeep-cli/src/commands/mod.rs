//! CLI command implementations.

mod auth;
mod items;

pub use auth::{login, logout, register, status};
pub use items::{items_add, items_edit, items_list, items_remove};

use anyhow::Result;
use listkeep_auth::{RestIdentityProvider, SessionManager, Subscription};
use listkeep_config::{Config, Paths};
use listkeep_items::{ItemRepository, ItemStoreClient, RealtimeStore, RestRealtimeStore};
use listkeep_storage::create_file_secrets_manager;
use std::sync::Arc;
use tracing::debug;

/// Session manager and item client wired against the configured backend.
pub struct Context {
    pub sessions: Arc<SessionManager>,
    pub items: ItemStoreClient,
    _binding: Subscription,
}

impl Context {
    /// Build the clients and resolve the persisted session.
    ///
    /// When a session is restored, the item client starts its first fetch
    /// immediately; call `ItemStoreClient::wait_for_initial_load` before
    /// reading the mirror.
    pub async fn open(paths: &Paths, config: &Config) -> Result<Self> {
        let provider = Arc::new(RestIdentityProvider::new(
            config.auth_url.clone(),
            config.token_url.clone(),
            config.api_key.clone(),
        ));
        let secrets = create_file_secrets_manager(paths.session_file());
        let sessions = Arc::new(SessionManager::new(provider, secrets));

        let store = Arc::new(RestRealtimeStore::new(
            config.database_url.clone(),
            sessions.clone(),
        ));
        Self::assemble(sessions, store).await
    }

    /// Bind an item client over `store` to `sessions` and resolve.
    async fn assemble(
        sessions: Arc<SessionManager>,
        store: Arc<dyn RealtimeStore>,
    ) -> Result<Self> {
        let items = ItemStoreClient::new(
            ItemRepository::new(store),
            tokio::runtime::Handle::current(),
        );
        let binding = items.bind(&sessions);

        let state = sessions.resolve().await?;
        debug!(signed_in = state.is_signed_in(), "Session resolved");

        Ok(Self {
            sessions,
            items,
            _binding: binding,
        })
    }
}
