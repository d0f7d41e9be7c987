//! Per-user item collections for listkeep.
//!
//! - [`ItemRepository`]: stateless create/list/update/delete addressed by
//!   user ID, over any [`RealtimeStore`]
//! - [`ItemStoreClient`]: the stateful side; binds to a
//!   [`SessionManager`](listkeep_auth::SessionManager), keeps the local
//!   mirror of the signed-in user's collection and re-fetches it after every
//!   successful mutation
//! - [`RestRealtimeStore`] and [`MemoryRealtimeStore`]: store backends

mod client;
mod error;
mod id;
mod model;
mod repository;
mod store;

pub use client::ItemStoreClient;
pub use error::{ItemError, ItemResult, StoreError, StoreResult, ValidationError};
pub use id::ItemIdGenerator;
pub use model::{EditDraft, Item, ItemFields, MirrorSnapshot};
pub use repository::{item_path, items_path, ItemRepository};
pub use store::{MemoryRealtimeStore, RealtimeStore, RestRealtimeStore};
