//! Stateful item client bound to the signed-in session.
//!
//! The client keeps a mirror of the signed-in user's whole collection.
//! The mirror is only ever replaced wholesale:
//! - cleared (and marked unloaded) on every session change
//! - replaced with the full `list` result by [`ItemStoreClient::refresh`],
//!   which runs once on every transition into `SignedIn` and after every
//!   successful create, update or delete
//!
//! Each fetch remembers the session epoch it was issued under. A fetch that
//! completes after the session changed is discarded, so a list still in
//! flight at sign-out never repopulates the mirror. Overlapping fetches
//! within one session are not ordered: the last one to complete wins.

use crate::{
    EditDraft, Item, ItemFields, ItemRepository, ItemResult, MirrorSnapshot, StoreError,
};
use listkeep_auth::{SessionManager, SessionState, Subscription};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

struct Binding {
    user_id: Option<String>,
    /// Bumped on every session change.
    epoch: u64,
    draft: Option<EditDraft>,
}

struct Inner {
    repository: ItemRepository,
    binding: Mutex<Binding>,
    mirror: watch::Sender<MirrorSnapshot>,
    initial_load: Mutex<Option<JoinHandle<ItemResult<bool>>>>,
    /// Tokio runtime handle for spawning the fetch that follows sign-in.
    runtime: tokio::runtime::Handle,
}

/// Item client for the signed-in user.
///
/// Cheap to clone; clones share the mirror and session binding.
#[derive(Clone)]
pub struct ItemStoreClient {
    inner: Arc<Inner>,
}

impl ItemStoreClient {
    pub fn new(repository: ItemRepository, runtime: tokio::runtime::Handle) -> Self {
        let (mirror, _) = watch::channel(MirrorSnapshot::unloaded());
        Self {
            inner: Arc::new(Inner {
                repository,
                binding: Mutex::new(Binding {
                    user_id: None,
                    epoch: 0,
                    draft: None,
                }),
                mirror,
                initial_load: Mutex::new(None),
                runtime,
            }),
        }
    }

    /// Follow `sessions`: the client binds to whoever is signed in and
    /// unbinds on sign-out or expiry. Dropping the returned subscription
    /// stops following.
    pub fn bind(&self, sessions: &SessionManager) -> Subscription {
        let client = self.clone();
        sessions.subscribe(move |state| client.on_session_change(state))
    }

    /// React to a session state. A change of user clears the mirror and the
    /// edit draft; a new signed-in user gets an initial fetch on the runtime.
    pub fn on_session_change(&self, state: &SessionState) {
        let user_id = state.user_id().map(str::to_string);

        let epoch = {
            let mut binding = self.inner.binding.lock();
            if binding.user_id == user_id {
                return;
            }
            binding.user_id = user_id.clone();
            binding.epoch += 1;
            binding.draft = None;
            self.inner.mirror.send_replace(MirrorSnapshot::unloaded());
            binding.epoch
        };

        debug!(epoch, user_id = ?user_id, "Item client rebound");

        if let Some(user_id) = user_id {
            let client = self.clone();
            let handle = self.inner.runtime.spawn(async move {
                let result = client.reload(&user_id, epoch).await;
                if let Err(e) = &result {
                    warn!(user_id = %user_id, epoch, error = %e, "Initial item fetch failed");
                }
                result
            });
            *self.inner.initial_load.lock() = Some(handle);
        }
    }

    /// Wait for the fetch spawned by the last sign-in, returning its error if
    /// it failed. Returns immediately if there is none outstanding.
    pub async fn wait_for_initial_load(&self) -> ItemResult<()> {
        let handle = self.inner.initial_load.lock().take();
        match handle {
            Some(handle) => match handle.await {
                Ok(result) => result.map(|_| ()),
                Err(e) => Err(StoreError::Unavailable(format!("initial fetch task failed: {e}")).into()),
            },
            None => Ok(()),
        }
    }

    fn bound(&self) -> Option<(String, u64)> {
        let binding = self.inner.binding.lock();
        binding
            .user_id
            .clone()
            .map(|user_id| (user_id, binding.epoch))
    }

    /// User ID the client is bound to, if any.
    pub fn user_id(&self) -> Option<String> {
        self.inner.binding.lock().user_id.clone()
    }

    /// Current mirror.
    pub fn snapshot(&self) -> MirrorSnapshot {
        self.inner.mirror.borrow().clone()
    }

    pub fn items(&self) -> Arc<[Item]> {
        self.inner.mirror.borrow().items.clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.mirror.borrow().loaded
    }

    /// Receiver that observes every mirror replacement.
    pub fn watch(&self) -> watch::Receiver<MirrorSnapshot> {
        self.inner.mirror.subscribe()
    }

    async fn reload(&self, user_id: &str, epoch: u64) -> ItemResult<bool> {
        let items = self.inner.repository.list(user_id).await?;
        Ok(self.apply(epoch, items))
    }

    /// Swap in a fetched collection unless the session moved on.
    fn apply(&self, epoch: u64, items: Vec<Item>) -> bool {
        let binding = self.inner.binding.lock();
        if binding.epoch != epoch {
            debug!(
                issued_epoch = epoch,
                current_epoch = binding.epoch,
                "Discarding stale item list"
            );
            return false;
        }
        let count = items.len();
        self.inner.mirror.send_replace(MirrorSnapshot::loaded(items));
        debug!(epoch, count, "Item mirror replaced");
        true
    }

    /// Re-fetch the whole collection and replace the mirror.
    ///
    /// Returns whether the mirror was replaced: `false` when no session is
    /// bound or the session changed while the fetch was in flight.
    pub async fn refresh(&self) -> ItemResult<bool> {
        let Some((user_id, epoch)) = self.bound() else {
            debug!("Refresh skipped, no session bound");
            return Ok(false);
        };
        self.reload(&user_id, epoch).await
    }

    /// Create an item, then refresh.
    ///
    /// Validation happens first and never touches the network. Clears any
    /// edit draft. Returns the new ID, or `None` if no session is bound.
    pub async fn create(&self, name: &str, description: &str) -> ItemResult<Option<String>> {
        let fields = ItemFields::new(name, description)?;
        self.inner.binding.lock().draft = None;

        let Some((user_id, _)) = self.bound() else {
            debug!("Create not issued, no session bound");
            return Ok(None);
        };

        let item_id = self.inner.repository.create(&user_id, &fields).await?;
        info!(user_id = %user_id, item_id = %item_id, "Item created");
        self.refresh().await?;
        Ok(Some(item_id))
    }

    /// Overwrite an item's name and description, then refresh.
    ///
    /// A missing ID is not an error. Returns `false` if no session is bound.
    pub async fn update(&self, item_id: &str, name: &str, description: &str) -> ItemResult<bool> {
        let fields = ItemFields::new(name, description)?;

        let Some((user_id, _)) = self.bound() else {
            debug!("Update not issued, no session bound");
            return Ok(false);
        };

        self.inner
            .repository
            .update(&user_id, item_id, &fields)
            .await?;
        info!(user_id = %user_id, item_id = %item_id, "Item updated");
        self.refresh().await?;
        Ok(true)
    }

    /// Delete an item, then refresh.
    ///
    /// A missing ID is not an error. Returns `false` if no session is bound.
    pub async fn delete(&self, item_id: &str) -> ItemResult<bool> {
        let Some((user_id, _)) = self.bound() else {
            debug!("Delete not issued, no session bound");
            return Ok(false);
        };

        self.inner.repository.delete(&user_id, item_id).await?;
        info!(user_id = %user_id, item_id = %item_id, "Item deleted");
        self.refresh().await?;
        Ok(true)
    }

    /// Start editing `item`, replacing any current draft.
    pub fn begin_edit(&self, item: &Item) {
        self.inner.binding.lock().draft = Some(EditDraft::from_item(item));
    }

    /// Replace the draft's text. Returns `false` if nothing is being edited.
    pub fn edit_draft(&self, name: impl Into<String>, description: impl Into<String>) -> bool {
        let mut binding = self.inner.binding.lock();
        match binding.draft.as_mut() {
            Some(draft) => {
                draft.name = name.into();
                draft.description = description.into();
                true
            }
            None => false,
        }
    }

    pub fn draft(&self) -> Option<EditDraft> {
        self.inner.binding.lock().draft.clone()
    }

    pub fn cancel_edit(&self) {
        self.inner.binding.lock().draft = None;
    }

    /// Apply the draft as an update, clear it, then refresh.
    ///
    /// An invalid draft is kept so it can be corrected. Returns `false` if
    /// there is no draft or no session is bound.
    pub async fn submit_edit(&self) -> ItemResult<bool> {
        let Some(draft) = self.draft() else {
            return Ok(false);
        };
        let fields = ItemFields::new(draft.name.as_str(), draft.description.as_str())?;

        let Some((user_id, _)) = self.bound() else {
            debug!("Edit not submitted, no session bound");
            return Ok(false);
        };

        self.inner
            .repository
            .update(&user_id, &draft.item_id, &fields)
            .await?;
        {
            let mut binding = self.inner.binding.lock();
            if binding
                .draft
                .as_ref()
                .is_some_and(|current| current.item_id == draft.item_id)
            {
                binding.draft = None;
            }
        }
        info!(user_id = %user_id, item_id = %draft.item_id, "Item edit submitted");
        self.refresh().await?;
        Ok(true)
    }
}
