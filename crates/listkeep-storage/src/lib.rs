//! Session secret storage for listkeep.
//!
//! - [`SecureStorage`]: the key-value backend trait
//! - [`MemoryStorage`]: process-local backend (tests, throwaway sessions)
//! - [`FileStorage`]: JSON file backend with owner-only permissions on unix
//! - [`SecretsManager`]: typed access to the persisted provider session

mod backends;
mod keys;
mod secrets;
mod traits;

pub use backends::{FileStorage, MemoryStorage};
pub use keys::StorageKeys;
pub use secrets::{SecretsManager, SessionMeta, StoredSession};
pub use traits::SecureStorage;

use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Encoding(err.to_string())
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Create a SecretsManager persisting to the given session file.
pub fn create_file_secrets_manager(path: impl Into<std::path::PathBuf>) -> SecretsManager {
    SecretsManager::new(Box::new(FileStorage::new(path)))
}
