//! Session lifecycle state machine using rust-fsm.
//!
//! ## State Diagram
//!
//! ```text
//! ┌─────────────────┐  SessionRestored   ┌─────────────────┐
//! │   Unresolved    │ ─────────────────► │    SignedIn     │◄──────────┐
//! └────────┬────────┘                    └──┬───────────┬──┘           │
//!          │ NoSession                      │           │              │
//!          ▼                SessionExpired  │           │ Logout-      │ LogoutFailed
//! ┌─────────────────┐ ◄─────────────────────┘           │ Requested    │
//! │    SignedOut    │                                   ▼              │
//! └──┬──────────▲───┘                        ┌─────────────────┐       │
//!    │          │       LogoutComplete       │   SigningOut    │ ──────┘
//!    │          └─────────────────────────── └─────────────────┘
//!    │ CredentialsSubmitted (also from Unresolved)
//!    ▼
//! ┌─────────────────┐  Authenticated ──► SignedIn
//! │ Authenticating  │  Rejected      ──► SignedOut
//! └─────────────────┘
//! ```
//!
//! Callers never see the transient states. [`SessionState`] folds
//! `Authenticating` into `SignedOut` and `SigningOut` into `SignedIn`.

use rust_fsm::*;
use serde::{Deserialize, Serialize};

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub auth_machine(Unresolved)

    Unresolved => {
        SessionRestored => SignedIn,
        NoSession => SignedOut,
        CredentialsSubmitted => Authenticating
    },
    SignedOut => {
        CredentialsSubmitted => Authenticating
    },
    Authenticating => {
        Authenticated => SignedIn,
        Rejected => SignedOut
    },
    SignedIn => {
        LogoutRequested => SigningOut,
        SessionExpired => SignedOut
    },
    SigningOut => {
        LogoutComplete => SignedOut,
        LogoutFailed => SignedIn
    }
}

pub use auth_machine::Input as AuthMachineInput;
pub use auth_machine::State as AuthMachineState;
pub use auth_machine::StateMachine as AuthMachine;

/// The signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSession {
    /// Opaque ID issued by the identity provider. Scopes all item data.
    pub user_id: String,
    pub email: String,
}

/// Session state as observed by subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    /// The persisted session has not been read yet.
    Unresolved,
    SignedOut,
    SignedIn(UserSession),
}

impl SessionState {
    /// Fold a machine state into the public view.
    ///
    /// `user` is only consulted for the signed-in states; a signed-in machine
    /// with no user reads as `SignedOut`.
    pub(crate) fn project(state: &AuthMachineState, user: Option<&UserSession>) -> Self {
        match state {
            AuthMachineState::Unresolved => SessionState::Unresolved,
            AuthMachineState::SignedOut | AuthMachineState::Authenticating => {
                SessionState::SignedOut
            }
            AuthMachineState::SignedIn | AuthMachineState::SigningOut => match user {
                Some(user) => SessionState::SignedIn(user.clone()),
                None => SessionState::SignedOut,
            },
        }
    }

    pub fn is_signed_in(&self) -> bool {
        matches!(self, SessionState::SignedIn(_))
    }

    pub fn user(&self) -> Option<&UserSession> {
        match self {
            SessionState::SignedIn(user) => Some(user),
            _ => None,
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user().map(|user| user.user_id.as_str())
    }
}
