//! In-process identity provider.
//!
//! Mirrors the REST provider's observable behavior (error codes included)
//! without a network. Used by tests.

use super::{IdentityProvider, ProviderSession};
use crate::{AuthError, AuthResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};

const MIN_PASSWORD_LEN: usize = 6;
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

#[derive(Debug, Clone)]
struct Account {
    user_id: String,
    email: String,
    password: String,
}

#[derive(Default)]
struct Accounts {
    by_email: HashMap<String, Account>,
    /// refresh token -> email
    refresh_tokens: HashMap<String, String>,
}

/// Identity provider that keeps accounts in memory.
pub struct MemoryIdentityProvider {
    accounts: Mutex<Accounts>,
    counter: AtomicU64,
    token_lifetime_secs: AtomicI64,
    fail_sign_out: AtomicBool,
}

impl Default for MemoryIdentityProvider {
    fn default() -> Self {
        Self {
            accounts: Mutex::new(Accounts::default()),
            counter: AtomicU64::new(0),
            token_lifetime_secs: AtomicI64::new(DEFAULT_TOKEN_LIFETIME_SECS),
            fail_sign_out: AtomicBool::new(false),
        }
    }
}

impl MemoryIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lifetime of ID tokens issued from now on. Zero or negative issues
    /// tokens that are already expired.
    pub fn set_token_lifetime(&self, secs: i64) {
        self.token_lifetime_secs.store(secs, Ordering::SeqCst);
    }

    /// Make subsequent `sign_out` calls fail.
    pub fn set_sign_out_failure(&self, fail: bool) {
        self.fail_sign_out.store(fail, Ordering::SeqCst);
    }

    /// Invalidate every outstanding refresh token.
    pub fn revoke_refresh_tokens(&self) {
        self.accounts.lock().refresh_tokens.clear();
    }

    fn next_serial(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn issue(&self, accounts: &mut Accounts, account: &Account) -> ProviderSession {
        let serial = self.next_serial();
        let refresh_token = format!("refresh-{}-{}", account.user_id, serial);
        accounts
            .refresh_tokens
            .insert(refresh_token.clone(), account.email.clone());

        ProviderSession {
            user_id: account.user_id.clone(),
            email: Some(account.email.clone()),
            id_token: format!("id-{}-{}", account.user_id, serial),
            refresh_token,
            expires_in: self.token_lifetime_secs.load(Ordering::SeqCst),
        }
    }
}

fn normalize_email(email: &str) -> AuthResult<String> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(AuthError::Rejected("INVALID_EMAIL".to_string())),
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    async fn create_account(&self, email: &str, password: &str) -> AuthResult<ProviderSession> {
        let email = normalize_email(email)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::Rejected(
                "WEAK_PASSWORD : Password should be at least 6 characters".to_string(),
            ));
        }

        let mut accounts = self.accounts.lock();
        if accounts.by_email.contains_key(&email) {
            return Err(AuthError::Rejected("EMAIL_EXISTS".to_string()));
        }

        let account = Account {
            user_id: format!("user-{}", self.next_serial()),
            email: email.clone(),
            password: password.to_string(),
        };
        accounts.by_email.insert(email, account.clone());
        Ok(self.issue(&mut accounts, &account))
    }

    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<ProviderSession> {
        let email = normalize_email(email)?;
        let mut accounts = self.accounts.lock();

        let account = accounts
            .by_email
            .get(&email)
            .cloned()
            .ok_or_else(|| AuthError::Rejected("EMAIL_NOT_FOUND".to_string()))?;
        if account.password != password {
            return Err(AuthError::Rejected("INVALID_PASSWORD".to_string()));
        }

        Ok(self.issue(&mut accounts, &account))
    }

    async fn sign_out(&self, _id_token: &str) -> AuthResult<()> {
        if self.fail_sign_out.load(Ordering::SeqCst) {
            return Err(AuthError::Provider {
                status: 503,
                message: "sign-out unavailable".to_string(),
            });
        }
        Ok(())
    }

    async fn refresh(&self, refresh_token: &str) -> AuthResult<ProviderSession> {
        let mut accounts = self.accounts.lock();

        let email = accounts
            .refresh_tokens
            .remove(refresh_token)
            .ok_or_else(|| AuthError::Rejected("TOKEN_EXPIRED".to_string()))?;
        let account = accounts
            .by_email
            .get(&email)
            .cloned()
            .ok_or_else(|| AuthError::Rejected("USER_NOT_FOUND".to_string()))?;

        let mut session = self.issue(&mut accounts, &account);
        session.email = None;
        Ok(session)
    }
}
