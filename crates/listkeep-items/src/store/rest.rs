//! REST realtime database client.
//!
//! Each node is exposed as `{database_url}/{path}.json`; reads, replacements,
//! merges and deletes map to GET, PUT, PATCH and DELETE. Requests carry the
//! signed-in user's ID token as the `auth` query parameter.

use super::RealtimeStore;
use crate::{StoreError, StoreResult};
use async_trait::async_trait;
use listkeep_auth::TokenSource;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => parsed.error,
        Err(_) if body.trim().is_empty() => "empty response".to_string(),
        Err(_) => body.trim().to_string(),
    }
}

/// Realtime database reached over HTTPS.
#[derive(Clone)]
pub struct RestRealtimeStore {
    http_client: reqwest::Client,
    database_url: String,
    tokens: Arc<dyn TokenSource>,
}

impl RestRealtimeStore {
    /// # Arguments
    /// * `database_url` - Database root (e.g. `https://project-default-rtdb.firebaseio.com`)
    /// * `tokens` - Source of ID tokens, typically the `SessionManager`
    pub fn new(database_url: impl Into<String>, tokens: Arc<dyn TokenSource>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            database_url: database_url.into(),
            tokens,
        }
    }

    fn node_url(&self, path: &str) -> String {
        format!(
            "{}/{}.json",
            self.database_url.trim_end_matches('/'),
            path.trim_matches('/')
        )
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> StoreResult<reqwest::Response> {
        let token = self.tokens.access_token().await?;

        debug!(method = %method, path = %path, "Data store request");

        let mut request = self
            .http_client
            .request(method.clone(), self.node_url(path))
            .query(&[("auth", token.as_str())]);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = error_message(&body);
        warn!(method = %method, path = %path, status = %status, message = %message, "Data store request failed");
        Err(StoreError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl RealtimeStore for RestRealtimeStore {
    async fn set(&self, path: &str, value: Value) -> StoreResult<()> {
        self.send(Method::PUT, path, Some(&value)).await?;
        Ok(())
    }

    async fn get(&self, path: &str) -> StoreResult<Option<Value>> {
        let value: Value = self.send(Method::GET, path, None).await?.json().await?;
        Ok(match value {
            Value::Null => None,
            value => Some(value),
        })
    }

    /// Shallow merge via `PATCH`.
    ///
    /// The hosted database creates the node when it is missing, so updating
    /// a deleted or unknown ID writes a new item with just these fields.
    /// Callers do not check existence first.
    async fn update(&self, path: &str, fields: Map<String, Value>) -> StoreResult<()> {
        self.send(Method::PATCH, path, Some(&Value::Object(fields)))
            .await?;
        Ok(())
    }

    async fn remove(&self, path: &str) -> StoreResult<()> {
        self.send(Method::DELETE, path, None).await?;
        Ok(())
    }
}
