//! Authentication error types.

use thiserror::Error;

/// Authentication error type.
#[derive(Error, Debug)]
pub enum AuthError {
    /// The identity provider refused the request. Carries the provider's
    /// message verbatim (e.g. `EMAIL_EXISTS`, `INVALID_PASSWORD`).
    #[error("{0}")]
    Rejected(String),

    /// The identity provider failed for a reason unrelated to the credentials
    #[error("Identity provider error: HTTP {status}: {message}")]
    Provider { status: u16, message: String },

    /// Session not found
    #[error("Not logged in")]
    NotLoggedIn,

    /// Session expired and refresh failed
    #[error("Session expired")]
    SessionExpired,

    /// Invalid state transition in the auth FSM
    #[error("Invalid auth state transition: {0}")]
    InvalidStateTransition(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] listkeep_storage::StorageError),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parse error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl AuthError {
    /// Returns true if this error is transient and the operation can be retried.
    ///
    /// Nothing in this crate retries on its own; callers decide.
    pub fn is_transient(&self) -> bool {
        match self {
            AuthError::Provider { status, .. } => *status >= 500,
            AuthError::Http(e) => {
                if e.is_connect() || e.is_timeout() {
                    return true;
                }
                if let Some(status) = e.status() {
                    return status.is_server_error();
                }
                false
            }
            _ => false,
        }
    }
}

/// Result type alias using AuthError.
pub type AuthResult<T> = Result<T, AuthError>;
