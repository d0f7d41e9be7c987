//! Typed API over [`SecureStorage`] for the persisted provider session.

use crate::{SecureStorage, StorageKeys, StorageResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Non-secret session metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMeta {
    /// User ID issued by the identity provider
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
    /// When the ID token expires (RFC 3339)
    pub expires_at: String,
}

/// A complete provider session as persisted between runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSession {
    pub user_id: String,
    pub email: Option<String>,
    pub id_token: String,
    pub refresh_token: String,
    /// RFC 3339 timestamp
    pub expires_at: String,
}

impl StoredSession {
    /// True when `expires_at` is in the past or cannot be parsed.
    pub fn is_expired(&self) -> bool {
        is_expired_at(&self.expires_at, Utc::now())
    }
}

fn is_expired_at(expires_at: &str, now: DateTime<Utc>) -> bool {
    match DateTime::parse_from_rfc3339(expires_at) {
        Ok(expires_at) => expires_at.with_timezone(&Utc) <= now,
        Err(_) => true,
    }
}

/// High-level API for storing and retrieving the provider session.
pub struct SecretsManager {
    storage: Box<dyn SecureStorage>,
}

impl SecretsManager {
    pub fn new(storage: Box<dyn SecureStorage>) -> Self {
        Self { storage }
    }

    /// Persist tokens and metadata for a session, replacing any previous one.
    pub fn set_session(&self, session: &StoredSession) -> StorageResult<()> {
        let meta = SessionMeta {
            user_id: session.user_id.clone(),
            email: session.email.clone(),
            expires_at: session.expires_at.clone(),
        };

        self.storage.set(StorageKeys::ID_TOKEN, &session.id_token)?;
        self.storage
            .set(StorageKeys::REFRESH_TOKEN, &session.refresh_token)?;
        self.storage
            .set(StorageKeys::SESSION_META, &serde_json::to_string(&meta)?)?;
        Ok(())
    }

    /// Read the persisted session.
    ///
    /// A partially written session (any of the three entries missing) reads
    /// as `None`.
    pub fn get_session(&self) -> StorageResult<Option<StoredSession>> {
        let Some(meta) = self.get_session_meta()? else {
            return Ok(None);
        };
        let Some(id_token) = self.storage.get(StorageKeys::ID_TOKEN)? else {
            tracing::debug!("Session metadata present without ID token");
            return Ok(None);
        };
        let Some(refresh_token) = self.storage.get(StorageKeys::REFRESH_TOKEN)? else {
            tracing::debug!("Session metadata present without refresh token");
            return Ok(None);
        };

        Ok(Some(StoredSession {
            user_id: meta.user_id,
            email: meta.email,
            id_token,
            refresh_token,
            expires_at: meta.expires_at,
        }))
    }

    pub fn get_session_meta(&self) -> StorageResult<Option<SessionMeta>> {
        match self.storage.get(StorageKeys::SESSION_META)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn has_session(&self) -> StorageResult<bool> {
        Ok(self.get_session()?.is_some())
    }

    /// Remove every session entry.
    pub fn clear_session(&self) -> StorageResult<()> {
        self.storage.delete(StorageKeys::ID_TOKEN)?;
        self.storage.delete(StorageKeys::REFRESH_TOKEN)?;
        self.storage.delete(StorageKeys::SESSION_META)?;
        Ok(())
    }
}
