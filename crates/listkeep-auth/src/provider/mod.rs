//! Identity provider seam.
//!
//! [`SessionManager`](crate::SessionManager) talks to the provider only
//! through [`IdentityProvider`], so tests and demos can swap the REST client
//! for [`MemoryIdentityProvider`].

mod memory;
mod rest;

pub use memory::MemoryIdentityProvider;
pub use rest::RestIdentityProvider;

use crate::AuthResult;
use async_trait::async_trait;

/// Tokens and identity returned by the provider after a successful
/// account creation, sign-in or refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSession {
    pub user_id: String,
    /// Absent on token refresh responses.
    pub email: Option<String>,
    pub id_token: String,
    pub refresh_token: String,
    /// Lifetime of `id_token` in seconds.
    pub expires_in: i64,
}

/// Email/password identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Create an account and sign it in.
    async fn create_account(&self, email: &str, password: &str) -> AuthResult<ProviderSession>;

    /// Sign in to an existing account.
    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<ProviderSession>;

    /// End the session identified by `id_token`.
    async fn sign_out(&self, id_token: &str) -> AuthResult<()>;

    /// Exchange a refresh token for a fresh ID token.
    async fn refresh(&self, refresh_token: &str) -> AuthResult<ProviderSession>;
}
