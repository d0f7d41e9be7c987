//! REST identity provider client.
//!
//! Speaks the Identity Toolkit account endpoints and the secure token
//! refresh endpoint. Provider error messages are surfaced verbatim as
//! [`AuthError::Rejected`] for 4xx responses.

use super::{IdentityProvider, ProviderSession};
use crate::{AuthError, AuthResult};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

/// Account endpoint response (`accounts:signUp`, `accounts:signInWithPassword`).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    id_token: String,
    refresh_token: String,
    expires_in: String,
}

/// Secure token endpoint response.
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    user_id: String,
    id_token: String,
    refresh_token: String,
    expires_in: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Extract the provider's error message, falling back to the raw body.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => envelope.error.message,
        Err(_) if body.trim().is_empty() => "empty response".to_string(),
        Err(_) => body.trim().to_string(),
    }
}

fn parse_expires_in(raw: &str) -> i64 {
    raw.trim().parse().unwrap_or(0)
}

/// Identity provider reached over HTTPS.
#[derive(Clone)]
pub struct RestIdentityProvider {
    http_client: reqwest::Client,
    auth_url: String,
    token_url: String,
    api_key: String,
}

impl RestIdentityProvider {
    /// Create a new client.
    ///
    /// # Arguments
    /// * `auth_url` - Account endpoint base (e.g. `https://identitytoolkit.googleapis.com`)
    /// * `token_url` - Token refresh base (e.g. `https://securetoken.googleapis.com`)
    /// * `api_key` - Public web API key
    pub fn new(
        auth_url: impl Into<String>,
        token_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            auth_url: auth_url.into(),
            token_url: token_url.into(),
            api_key: api_key.into(),
        }
    }

    fn account_url(&self, action: &str) -> String {
        format!(
            "{}/v1/accounts:{}",
            self.auth_url.trim_end_matches('/'),
            action
        )
    }

    fn refresh_url(&self) -> String {
        format!("{}/v1/token", self.token_url.trim_end_matches('/'))
    }

    async fn account_request(
        &self,
        action: &str,
        email: &str,
        password: &str,
    ) -> AuthResult<ProviderSession> {
        let url = self.account_url(action);
        debug!(url = %url, email = %email, "Identity provider request");

        let response = self
            .http_client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&serde_json::json!({
                "email": email,
                "password": password,
                "returnSecureToken": true,
            }))
            .send()
            .await?;

        let response = check_status(response, action).await?;
        let data: AccountResponse = response.json().await?;

        Ok(ProviderSession {
            user_id: data.local_id,
            email: data.email.or_else(|| Some(email.to_string())),
            id_token: data.id_token,
            refresh_token: data.refresh_token,
            expires_in: parse_expires_in(&data.expires_in),
        })
    }
}

/// Map a non-success response to an error, consuming the body.
async fn check_status(response: reqwest::Response, action: &str) -> AuthResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body);
    warn!(status = %status, action = %action, message = %message, "Identity provider request failed");

    if status.is_client_error() {
        Err(AuthError::Rejected(message))
    } else {
        Err(AuthError::Provider {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl IdentityProvider for RestIdentityProvider {
    async fn create_account(&self, email: &str, password: &str) -> AuthResult<ProviderSession> {
        self.account_request("signUp", email, password).await
    }

    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<ProviderSession> {
        self.account_request("signInWithPassword", email, password)
            .await
    }

    /// ID tokens cannot be revoked through the public API; signing out only
    /// discards them locally.
    async fn sign_out(&self, _id_token: &str) -> AuthResult<()> {
        debug!("Sign-out is local for the REST provider");
        Ok(())
    }

    async fn refresh(&self, refresh_token: &str) -> AuthResult<ProviderSession> {
        let url = self.refresh_url();
        debug!(url = %url, "Refreshing ID token");

        let response = self
            .http_client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await?;

        let response = check_status(response, "refresh").await?;
        let data: RefreshResponse = response.json().await?;

        Ok(ProviderSession {
            user_id: data.user_id,
            email: None,
            id_token: data.id_token,
            refresh_token: data.refresh_token,
            expires_in: parse_expires_in(&data.expires_in),
        })
    }
}
