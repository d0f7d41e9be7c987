//! Session management using FSM-based state tracking.
//!
//! `SessionManager` owns the current identity. The FSM tracks transient
//! states (authenticating, signing out) that are never persisted, while the
//! provider tokens live in a [`SecretsManager`] so a later process can
//! resolve straight to `SignedIn`.

use crate::auth_fsm::{AuthMachine, AuthMachineInput, AuthMachineState, SessionState, UserSession};
use crate::provider::{IdentityProvider, ProviderSession};
use crate::token_source::TokenSource;
use crate::{AuthError, AuthResult};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use listkeep_storage::{SecretsManager, StoredSession};
use parking_lot::{Mutex, ReentrantMutex};
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

/// Callback invoked with the public session state.
pub type SessionCallback = Arc<dyn Fn(&SessionState) + Send + Sync>;

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    callbacks: BTreeMap<u64, SessionCallback>,
}

/// Deregistration handle returned by [`SessionManager::subscribe`].
///
/// Dropping it deregisters the callback.
#[must_use = "dropping a Subscription deregisters its callback"]
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Subscribers>>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().callbacks.remove(&self.id);
        }
    }
}

struct Core {
    machine: AuthMachine,
    user: Option<UserSession>,
}

impl Core {
    fn public_state(&self) -> SessionState {
        SessionState::project(self.machine.state(), self.user.as_ref())
    }
}

fn user_from(stored: &StoredSession) -> UserSession {
    UserSession {
        user_id: stored.user_id.clone(),
        email: stored.email.clone().unwrap_or_default(),
    }
}

/// Session manager for the signed-in identity.
pub struct SessionManager {
    provider: Arc<dyn IdentityProvider>,
    secrets: SecretsManager,
    core: Mutex<Core>,
    subscribers: Arc<Mutex<Subscribers>>,
    /// Held across each transition and its notifications so subscribers see
    /// transitions in the order they were applied. Reentrant so a callback
    /// may drive another transition.
    transitions: ReentrantMutex<()>,
    /// Serializes token refreshes; refresh tokens are single-use.
    refresh_lock: tokio::sync::Mutex<()>,
}

impl SessionManager {
    pub fn new(provider: Arc<dyn IdentityProvider>, secrets: SecretsManager) -> Self {
        Self {
            provider,
            secrets,
            core: Mutex::new(Core {
                machine: AuthMachine::new(),
                user: None,
            }),
            subscribers: Arc::new(Mutex::new(Subscribers::default())),
            transitions: ReentrantMutex::new(()),
            refresh_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Current public session state.
    pub fn current(&self) -> SessionState {
        self.core.lock().public_state()
    }

    fn machine_state(&self) -> AuthMachineState {
        self.core.lock().machine.state().clone()
    }

    /// Register `callback`. It is invoked immediately with the current state
    /// and again on every public state change until the returned
    /// [`Subscription`] is dropped.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&SessionState) + Send + Sync + 'static,
    {
        let callback: SessionCallback = Arc::new(callback);
        let id = {
            let mut subscribers = self.subscribers.lock();
            let id = subscribers.next_id;
            subscribers.next_id += 1;
            subscribers.callbacks.insert(id, callback.clone());
            id
        };

        callback(&self.current());

        Subscription {
            id,
            registry: Arc::downgrade(&self.subscribers),
        }
    }

    /// Transition the FSM and notify subscribers if the public state changed.
    ///
    /// `signed_in_as` is recorded before the public state is computed; any
    /// transition that lands outside the signed-in states forgets the user.
    fn transition(
        &self,
        input: &AuthMachineInput,
        signed_in_as: Option<UserSession>,
    ) -> AuthResult<SessionState> {
        self.transition_with(input, |_| Ok(signed_in_as))
    }

    /// Like [`Self::transition`], but `prepare` runs under the state lock
    /// first and supplies the user. An error from `prepare` leaves the
    /// machine untouched.
    fn transition_with<F>(&self, input: &AuthMachineInput, prepare: F) -> AuthResult<SessionState>
    where
        F: FnOnce(&Core) -> AuthResult<Option<UserSession>>,
    {
        let _order = self.transitions.lock();
        let (old_state, new_state) = {
            let mut core = self.core.lock();
            let old_state = core.public_state();
            let signed_in_as = prepare(&core)?;

            core.machine.consume(input).map_err(|_| {
                AuthError::InvalidStateTransition(format!(
                    "Cannot apply {:?} in state {:?}",
                    input,
                    core.machine.state()
                ))
            })?;

            if let Some(user) = signed_in_as {
                core.user = Some(user);
            }
            if !matches!(
                core.machine.state(),
                AuthMachineState::SignedIn | AuthMachineState::SigningOut
            ) {
                core.user = None;
            }

            (old_state, core.public_state())
        };

        if old_state != new_state {
            debug!(
                old_state = ?old_state,
                new_state = ?new_state,
                "Session state transition"
            );
            self.notify(&new_state);
        }

        Ok(new_state)
    }

    fn notify(&self, state: &SessionState) {
        let callbacks: Vec<SessionCallback> =
            self.subscribers.lock().callbacks.values().cloned().collect();
        for callback in callbacks {
            callback(state);
        }
    }

    /// Persist a provider session. `fallback_email` fills in for refresh
    /// responses, which carry no email.
    fn persist(
        &self,
        session: ProviderSession,
        fallback_email: Option<String>,
    ) -> AuthResult<StoredSession> {
        let stored = StoredSession {
            user_id: session.user_id,
            email: session.email.or(fallback_email),
            id_token: session.id_token,
            refresh_token: session.refresh_token,
            expires_at: (Utc::now() + Duration::seconds(session.expires_in)).to_rfc3339(),
        };
        self.secrets.set_session(&stored)?;
        Ok(stored)
    }

    /// Persist refreshed tokens only while `user_id` is still signed in.
    ///
    /// Checked and written under the state lock, so a logout that began
    /// during the refresh is never undone.
    fn persist_if_signed_in_as(
        &self,
        user_id: &str,
        session: ProviderSession,
        fallback_email: Option<String>,
    ) -> AuthResult<StoredSession> {
        let core = self.core.lock();
        let still_current = *core.machine.state() == AuthMachineState::SignedIn
            && core.user.as_ref().is_some_and(|user| user.user_id == user_id);
        if !still_current {
            return Err(AuthError::NotLoggedIn);
        }
        self.persist(session, fallback_email)
    }

    fn finish_authentication(
        &self,
        action: &'static str,
        result: AuthResult<ProviderSession>,
    ) -> AuthResult<UserSession> {
        match result.and_then(|session| self.persist(session, None)) {
            Ok(stored) => {
                let user = user_from(&stored);
                self.transition(&AuthMachineInput::Authenticated, Some(user.clone()))?;
                info!(user_id = %user.user_id, action, "Authentication successful");
                Ok(user)
            }
            Err(e) => {
                warn!(action, error = %e, "Authentication failed");
                self.transition(&AuthMachineInput::Rejected, None)?;
                Err(e)
            }
        }
    }

    /// Create an account and sign in as it.
    ///
    /// - Unresolved | SignedOut -> Authenticating -> (SignedIn | SignedOut)
    pub async fn register(&self, email: &str, password: &str) -> AuthResult<UserSession> {
        self.transition(&AuthMachineInput::CredentialsSubmitted, None)?;
        debug!(email = %email, "Registering account");
        let result = self.provider.create_account(email, password).await;
        self.finish_authentication("register", result)
    }

    /// Sign in with email and password.
    ///
    /// - Unresolved | SignedOut -> Authenticating -> (SignedIn | SignedOut)
    pub async fn login(&self, email: &str, password: &str) -> AuthResult<UserSession> {
        self.transition(&AuthMachineInput::CredentialsSubmitted, None)?;
        debug!(email = %email, "Attempting email/password login");
        let result = self.provider.sign_in(email, password).await;
        self.finish_authentication("login", result)
    }

    /// Sign out and clear the persisted session.
    ///
    /// - SignedIn -> SigningOut -> (SignedOut | SignedIn)
    ///
    /// On provider or storage failure the session stays signed in.
    pub async fn logout(&self) -> AuthResult<()> {
        self.transition(&AuthMachineInput::LogoutRequested, None)?;

        let outcome = async {
            if let Some(stored) = self.secrets.get_session()? {
                self.provider.sign_out(&stored.id_token).await?;
            }
            self.secrets.clear_session()?;
            Ok::<(), AuthError>(())
        }
        .await;

        match outcome {
            Ok(()) => {
                self.transition(&AuthMachineInput::LogoutComplete, None)?;
                info!("Logged out");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Logout failed");
                if let Err(fsm_err) = self.transition(&AuthMachineInput::LogoutFailed, None) {
                    warn!(error = %fsm_err, "Failed to restore session after logout failure");
                }
                Err(e)
            }
        }
    }

    /// Resolve the initial state from the persisted session.
    ///
    /// - none stored -> SignedOut
    /// - stored and unexpired -> SignedIn
    /// - stored but expired -> one refresh attempt; on failure the stored
    ///   session is cleared and the state becomes SignedOut
    ///
    /// Once resolved, further calls return the current state.
    pub async fn resolve(&self) -> AuthResult<SessionState> {
        if self.machine_state() != AuthMachineState::Unresolved {
            return Ok(self.current());
        }

        let stored = match self.secrets.get_session() {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "Failed to read persisted session");
                self.transition(&AuthMachineInput::NoSession, None)?;
                return Err(e.into());
            }
        };

        let Some(stored) = stored else {
            info!("No existing session found");
            return self.transition(&AuthMachineInput::NoSession, None);
        };

        if !stored.is_expired() {
            info!(user_id = %stored.user_id, "Session restored");
            return self.transition(&AuthMachineInput::SessionRestored, Some(user_from(&stored)));
        }

        info!(user_id = %stored.user_id, "Stored session expired, attempting refresh");
        let restored = match self.provider.refresh(&stored.refresh_token).await {
            Ok(session) => self.transition_with(&AuthMachineInput::SessionRestored, |core| {
                // A login may have started while the refresh was in flight.
                if *core.machine.state() != AuthMachineState::Unresolved {
                    return Err(AuthError::InvalidStateTransition(
                        "Session changed while refreshing the stored session".to_string(),
                    ));
                }
                let refreshed = self.persist(session, stored.email.clone())?;
                info!(user_id = %refreshed.user_id, "Session refreshed");
                Ok(Some(user_from(&refreshed)))
            }),
            Err(e) => Err(e),
        };

        match restored {
            Ok(state) => Ok(state),
            Err(AuthError::InvalidStateTransition(reason)) => {
                debug!(reason = %reason, "Discarding refreshed tokens");
                Ok(self.current())
            }
            Err(e) => {
                warn!(error = %e, "Session refresh failed, clearing session");
                let state = self.transition(&AuthMachineInput::NoSession, None)?;
                if let Err(e) = self.secrets.clear_session() {
                    warn!(error = %e, "Failed to clear stale session");
                }
                Ok(state)
            }
        }
    }

    /// Treat the session as expired: SignedIn -> SignedOut and the persisted
    /// session is cleared. No-op in any other state.
    pub fn expire(&self) -> AuthResult<()> {
        self.expire_user(None)
    }

    /// Expire the session, but only if it still belongs to `user_id` when
    /// one is given.
    fn expire_user(&self, user_id: Option<&str>) -> AuthResult<()> {
        {
            let core = self.core.lock();
            if *core.machine.state() != AuthMachineState::SignedIn {
                debug!("Expiry ignored outside SignedIn");
                return Ok(());
            }
            if let Some(user_id) = user_id {
                if core.user.as_ref().map(|user| user.user_id.as_str()) != Some(user_id) {
                    debug!(user_id = %user_id, "Expiry ignored, session belongs to another user");
                    return Ok(());
                }
            }
        }

        if let Err(e) = self.secrets.clear_session() {
            warn!(error = %e, "Failed to clear expired session");
        }
        self.transition(&AuthMachineInput::SessionExpired, None)?;
        info!("Session expired");
        Ok(())
    }
}

#[async_trait]
impl TokenSource for SessionManager {
    /// Return the stored ID token, refreshing it once if expired. A failed
    /// refresh expires the session.
    async fn access_token(&self) -> AuthResult<String> {
        if !self.current().is_signed_in() {
            return Err(AuthError::NotLoggedIn);
        }

        let _guard = self.refresh_lock.lock().await;

        let stored = self.secrets.get_session()?.ok_or(AuthError::NotLoggedIn)?;
        if !stored.is_expired() {
            return Ok(stored.id_token);
        }

        debug!(user_id = %stored.user_id, "ID token expired, refreshing");
        let refreshed = match self.provider.refresh(&stored.refresh_token).await {
            Ok(session) => self.persist_if_signed_in_as(&stored.user_id, session, stored.email.clone()),
            Err(e) => Err(e),
        };

        match refreshed {
            Ok(refreshed) => Ok(refreshed.id_token),
            Err(AuthError::NotLoggedIn) => {
                debug!(user_id = %stored.user_id, "Session ended during refresh, discarding tokens");
                Err(AuthError::NotLoggedIn)
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed, expiring session");
                self.expire_user(Some(&stored.user_id))?;
                Err(AuthError::SessionExpired)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryIdentityProvider;
    use listkeep_storage::{create_file_secrets_manager, MemoryStorage};
    use std::path::Path;

    fn manager_with(provider: &Arc<MemoryIdentityProvider>) -> SessionManager {
        SessionManager::new(
            provider.clone(),
            SecretsManager::new(Box::new(MemoryStorage::new())),
        )
    }

    fn file_manager(provider: &Arc<MemoryIdentityProvider>, path: &Path) -> SessionManager {
        SessionManager::new(provider.clone(), create_file_secrets_manager(path))
    }

    /// Delegates to the memory provider but holds each refresh until a
    /// permit is added to `gate`.
    struct GatedRefresh {
        inner: Arc<MemoryIdentityProvider>,
        entered: tokio::sync::Notify,
        gate: tokio::sync::Semaphore,
    }

    impl GatedRefresh {
        fn wrap(inner: Arc<MemoryIdentityProvider>) -> Arc<Self> {
            Arc::new(Self {
                inner,
                entered: tokio::sync::Notify::new(),
                gate: tokio::sync::Semaphore::new(0),
            })
        }
    }

    #[async_trait]
    impl IdentityProvider for GatedRefresh {
        async fn create_account(&self, email: &str, password: &str) -> AuthResult<ProviderSession> {
            self.inner.create_account(email, password).await
        }

        async fn sign_in(&self, email: &str, password: &str) -> AuthResult<ProviderSession> {
            self.inner.sign_in(email, password).await
        }

        async fn sign_out(&self, id_token: &str) -> AuthResult<()> {
            self.inner.sign_out(id_token).await
        }

        async fn refresh(&self, refresh_token: &str) -> AuthResult<ProviderSession> {
            self.entered.notify_one();
            let _permit = self.gate.acquire().await.unwrap();
            self.inner.refresh(refresh_token).await
        }
    }

    fn gated_manager(provider: &Arc<GatedRefresh>) -> Arc<SessionManager> {
        Arc::new(SessionManager::new(
            provider.clone(),
            SecretsManager::new(Box::new(MemoryStorage::new())),
        ))
    }

    fn record(manager: &SessionManager) -> (Arc<Mutex<Vec<SessionState>>>, Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let subscription = manager.subscribe(move |state| sink.lock().push(state.clone()));
        (seen, subscription)
    }

    #[tokio::test]
    async fn test_initial_state_is_unresolved() {
        let manager = manager_with(&Arc::new(MemoryIdentityProvider::new()));
        assert_eq!(manager.current(), SessionState::Unresolved);

        let (seen, _subscription) = record(&manager);
        assert_eq!(*seen.lock(), vec![SessionState::Unresolved]);
    }

    #[tokio::test]
    async fn test_resolve_without_session_signs_out() {
        let manager = manager_with(&Arc::new(MemoryIdentityProvider::new()));
        let (seen, _subscription) = record(&manager);

        let state = manager.resolve().await.unwrap();
        assert_eq!(state, SessionState::SignedOut);
        assert_eq!(
            *seen.lock(),
            vec![SessionState::Unresolved, SessionState::SignedOut]
        );

        // Resolving again is a no-op.
        assert_eq!(manager.resolve().await.unwrap(), SessionState::SignedOut);
        assert_eq!(seen.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_register_signs_in_and_persists() {
        let manager = manager_with(&Arc::new(MemoryIdentityProvider::new()));
        manager.resolve().await.unwrap();
        let (seen, _subscription) = record(&manager);

        let user = manager.register("a@example.com", "secret1").await.unwrap();
        assert_eq!(user.email, "a@example.com");
        assert_eq!(manager.current(), SessionState::SignedIn(user.clone()));
        assert_eq!(
            *seen.lock(),
            vec![SessionState::SignedOut, SessionState::SignedIn(user.clone())]
        );

        let stored = manager.secrets.get_session().unwrap().unwrap();
        assert_eq!(stored.user_id, user.user_id);
    }

    #[tokio::test]
    async fn test_register_rejection_surfaces_message() {
        let manager = manager_with(&Arc::new(MemoryIdentityProvider::new()));
        manager.resolve().await.unwrap();

        let err = manager.register("a@example.com", "abc").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "WEAK_PASSWORD : Password should be at least 6 characters"
        );
        assert_eq!(manager.current(), SessionState::SignedOut);
        assert!(!manager.secrets.has_session().unwrap());
    }

    #[tokio::test]
    async fn test_login_before_resolve() {
        let provider = Arc::new(MemoryIdentityProvider::new());
        provider.create_account("a@example.com", "secret1").await.unwrap();
        let manager = manager_with(&provider);

        let user = manager.login("a@example.com", "secret1").await.unwrap();
        assert_eq!(manager.current(), SessionState::SignedIn(user));
    }

    #[tokio::test]
    async fn test_login_unknown_account() {
        let manager = manager_with(&Arc::new(MemoryIdentityProvider::new()));
        manager.resolve().await.unwrap();

        let err = manager.login("nobody@example.com", "secret1").await.unwrap_err();
        assert!(matches!(err, AuthError::Rejected(ref m) if m == "EMAIL_NOT_FOUND"));
        assert_eq!(manager.current(), SessionState::SignedOut);
    }

    #[tokio::test]
    async fn test_login_while_signed_in_is_invalid() {
        let manager = manager_with(&Arc::new(MemoryIdentityProvider::new()));
        manager.register("a@example.com", "secret1").await.unwrap();

        let err = manager.login("a@example.com", "secret1").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidStateTransition(_)));
        assert!(manager.current().is_signed_in());
    }

    #[tokio::test]
    async fn test_logout_clears_session() {
        let manager = manager_with(&Arc::new(MemoryIdentityProvider::new()));
        manager.register("a@example.com", "secret1").await.unwrap();
        let (seen, _subscription) = record(&manager);

        manager.logout().await.unwrap();
        assert_eq!(manager.current(), SessionState::SignedOut);
        assert!(!manager.secrets.has_session().unwrap());
        assert_eq!(seen.lock().last(), Some(&SessionState::SignedOut));
        // SigningOut is folded into SignedIn, so only one change is seen.
        assert_eq!(seen.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_logout_while_signed_out_is_invalid() {
        let manager = manager_with(&Arc::new(MemoryIdentityProvider::new()));
        manager.resolve().await.unwrap();

        let err = manager.logout().await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidStateTransition(_)));
    }

    #[tokio::test]
    async fn test_logout_provider_failure_keeps_session() {
        let provider = Arc::new(MemoryIdentityProvider::new());
        let manager = manager_with(&provider);
        let user = manager.register("a@example.com", "secret1").await.unwrap();
        let (seen, _subscription) = record(&manager);

        provider.set_sign_out_failure(true);
        let err = manager.logout().await.unwrap_err();
        assert!(matches!(err, AuthError::Provider { .. }));
        assert_eq!(manager.current(), SessionState::SignedIn(user));
        assert!(manager.secrets.has_session().unwrap());
        assert_eq!(seen.lock().len(), 1);

        provider.set_sign_out_failure(false);
        manager.logout().await.unwrap();
        assert_eq!(manager.current(), SessionState::SignedOut);
    }

    #[tokio::test]
    async fn test_resolve_restores_persisted_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let provider = Arc::new(MemoryIdentityProvider::new());

        let user = file_manager(&provider, &path)
            .register("a@example.com", "secret1")
            .await
            .unwrap();

        let restarted = file_manager(&provider, &path);
        assert_eq!(
            restarted.resolve().await.unwrap(),
            SessionState::SignedIn(user)
        );
    }

    #[tokio::test]
    async fn test_resolve_refreshes_expired_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let provider = Arc::new(MemoryIdentityProvider::new());
        provider.set_token_lifetime(0);

        let first = file_manager(&provider, &path);
        let user = first.register("a@example.com", "secret1").await.unwrap();
        let old_token = first.secrets.get_session().unwrap().unwrap().id_token;

        let restarted = file_manager(&provider, &path);
        assert_eq!(
            restarted.resolve().await.unwrap(),
            SessionState::SignedIn(user.clone())
        );

        let stored = restarted.secrets.get_session().unwrap().unwrap();
        assert_ne!(stored.id_token, old_token);
        // Refresh responses carry no email; the stored one is kept.
        assert_eq!(stored.email.as_deref(), Some("a@example.com"));
    }

    #[tokio::test]
    async fn test_resolve_failed_refresh_signs_out_and_clears() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let provider = Arc::new(MemoryIdentityProvider::new());
        provider.set_token_lifetime(0);

        file_manager(&provider, &path)
            .register("a@example.com", "secret1")
            .await
            .unwrap();
        provider.revoke_refresh_tokens();

        let restarted = file_manager(&provider, &path);
        assert_eq!(restarted.resolve().await.unwrap(), SessionState::SignedOut);
        assert!(!restarted.secrets.has_session().unwrap());
    }

    #[tokio::test]
    async fn test_access_token_returns_current_token() {
        let manager = manager_with(&Arc::new(MemoryIdentityProvider::new()));
        assert!(matches!(
            manager.access_token().await,
            Err(AuthError::NotLoggedIn)
        ));

        manager.register("a@example.com", "secret1").await.unwrap();
        let stored = manager.secrets.get_session().unwrap().unwrap();
        assert_eq!(manager.access_token().await.unwrap(), stored.id_token);
    }

    #[tokio::test]
    async fn test_access_token_refreshes_expired_token() {
        let provider = Arc::new(MemoryIdentityProvider::new());
        provider.set_token_lifetime(0);
        let manager = manager_with(&provider);
        manager.register("a@example.com", "secret1").await.unwrap();
        let old_token = manager.secrets.get_session().unwrap().unwrap().id_token;

        let token = manager.access_token().await.unwrap();
        assert_ne!(token, old_token);
        assert!(manager.current().is_signed_in());
    }

    #[tokio::test]
    async fn test_access_token_failed_refresh_expires_session() {
        let provider = Arc::new(MemoryIdentityProvider::new());
        provider.set_token_lifetime(0);
        let manager = manager_with(&provider);
        manager.register("a@example.com", "secret1").await.unwrap();
        let (seen, _subscription) = record(&manager);

        provider.revoke_refresh_tokens();
        let err = manager.access_token().await.unwrap_err();
        assert!(matches!(err, AuthError::SessionExpired));
        assert_eq!(manager.current(), SessionState::SignedOut);
        assert_eq!(seen.lock().last(), Some(&SessionState::SignedOut));
        assert!(!manager.secrets.has_session().unwrap());
    }

    #[tokio::test]
    async fn test_expire_is_noop_when_signed_out() {
        let manager = manager_with(&Arc::new(MemoryIdentityProvider::new()));
        manager.expire().unwrap();
        assert_eq!(manager.current(), SessionState::Unresolved);
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_notifications() {
        let manager = manager_with(&Arc::new(MemoryIdentityProvider::new()));
        let (kept, _kept_subscription) = record(&manager);
        let (dropped, subscription) = record(&manager);

        subscription.unsubscribe();
        manager.resolve().await.unwrap();

        assert_eq!(dropped.lock().len(), 1);
        assert_eq!(kept.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_logout_during_token_refresh_stays_logged_out() {
        let memory = Arc::new(MemoryIdentityProvider::new());
        memory.set_token_lifetime(-10);
        let provider = GatedRefresh::wrap(memory);
        let manager = gated_manager(&provider);
        manager.register("a@example.com", "secret1").await.unwrap();

        let pending = tokio::spawn({
            let manager = manager.clone();
            async move { manager.access_token().await }
        });
        provider.entered.notified().await;
        manager.logout().await.unwrap();
        provider.gate.add_permits(1);

        assert!(matches!(pending.await.unwrap(), Err(AuthError::NotLoggedIn)));
        assert_eq!(manager.current(), SessionState::SignedOut);
        assert!(!manager.secrets.has_session().unwrap());
    }

    #[tokio::test]
    async fn test_failed_refresh_does_not_expire_next_user() {
        let memory = Arc::new(MemoryIdentityProvider::new());
        memory.set_token_lifetime(-10);
        let provider = GatedRefresh::wrap(memory.clone());
        let manager = gated_manager(&provider);
        manager.register("a@example.com", "secret1").await.unwrap();

        let pending = tokio::spawn({
            let manager = manager.clone();
            async move { manager.access_token().await }
        });
        provider.entered.notified().await;
        manager.logout().await.unwrap();
        let second = manager.register("b@example.com", "secret1").await.unwrap();
        memory.revoke_refresh_tokens();
        provider.gate.add_permits(1);

        assert!(pending.await.unwrap().is_err());
        assert_eq!(manager.current(), SessionState::SignedIn(second.clone()));
        let stored = manager.secrets.get_session().unwrap().unwrap();
        assert_eq!(stored.user_id, second.user_id);
    }

    #[tokio::test]
    async fn test_login_during_resolve_refresh_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let memory = Arc::new(MemoryIdentityProvider::new());
        memory.set_token_lifetime(-10);
        file_manager(&memory, &path)
            .register("a@example.com", "secret1")
            .await
            .unwrap();
        memory.create_account("b@example.com", "secret1").await.unwrap();

        let provider = GatedRefresh::wrap(memory);
        let restarted = Arc::new(SessionManager::new(
            provider.clone(),
            create_file_secrets_manager(&path),
        ));
        let resolving = tokio::spawn({
            let restarted = restarted.clone();
            async move { restarted.resolve().await }
        });
        provider.entered.notified().await;
        let second = restarted.login("b@example.com", "secret1").await.unwrap();
        provider.gate.add_permits(1);

        assert_eq!(
            resolving.await.unwrap().unwrap(),
            SessionState::SignedIn(second.clone())
        );
        let stored = restarted.secrets.get_session().unwrap().unwrap();
        assert_eq!(stored.user_id, second.user_id);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_transitions_notify_in_order() {
        let manager = Arc::new(manager_with(&Arc::new(MemoryIdentityProvider::new())));
        manager.resolve().await.unwrap();
        let (seen, _subscription) = record(&manager);

        for _ in 0..50 {
            manager.register("a@example.com", "secret1").await.ok();
            if !manager.current().is_signed_in() {
                manager.login("a@example.com", "secret1").await.unwrap();
            }

            let expiring = tokio::spawn({
                let manager = manager.clone();
                async move { manager.expire() }
            });
            let logging_out = tokio::spawn({
                let manager = manager.clone();
                async move { manager.logout().await }
            });
            expiring.await.unwrap().ok();
            logging_out.await.unwrap().ok();

            assert_eq!(manager.current(), SessionState::SignedOut);
            assert_eq!(seen.lock().last(), Some(&SessionState::SignedOut));
        }
    }

    #[tokio::test]
    async fn test_callback_may_drive_a_transition() {
        let manager = Arc::new(manager_with(&Arc::new(MemoryIdentityProvider::new())));
        manager.resolve().await.unwrap();

        let weak = Arc::downgrade(&manager);
        let _expire_on_sign_in = manager.subscribe(move |state| {
            if state.is_signed_in() {
                if let Some(manager) = weak.upgrade() {
                    manager.expire().unwrap();
                }
            }
        });

        manager.register("a@example.com", "secret1").await.unwrap();
        assert_eq!(manager.current(), SessionState::SignedOut);
    }
}
