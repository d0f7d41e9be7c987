//! Access tokens for downstream clients.

use crate::AuthResult;
use async_trait::async_trait;

/// Supplies a currently valid ID token for authenticated requests.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> AuthResult<String>;
}
