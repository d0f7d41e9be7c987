//! Item error types.

use thiserror::Error;

/// Input rejected before any network call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Item name must not be empty")]
    EmptyName,

    #[error("Item description must not be empty")]
    EmptyDescription,

    /// Key contains characters the data store reserves (`/ . # $ [ ]`)
    #[error("Invalid key: {0:?}")]
    InvalidKey(String),
}

/// Data store failure.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store answered with a non-success status
    #[error("Data store request failed: HTTP {status}: {message}")]
    Rejected { status: u16, message: String },

    /// No usable credentials for the request
    #[error("Authentication error: {0}")]
    Auth(#[from] listkeep_auth::AuthError),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The store could not be reached
    #[error("Data store unavailable: {0}")]
    Unavailable(String),
}

/// Error type for item operations.
#[derive(Error, Debug)]
pub enum ItemError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<listkeep_auth::AuthError> for ItemError {
    fn from(err: listkeep_auth::AuthError) -> Self {
        ItemError::Store(StoreError::Auth(err))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

pub type ItemResult<T> = Result<T, ItemError>;
