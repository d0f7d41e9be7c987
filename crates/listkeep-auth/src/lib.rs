//! Authentication for listkeep.
//!
//! This crate provides:
//! - An explicit FSM for the session lifecycle (`Unresolved`, `SignedOut`,
//!   `SignedIn`, plus transient internal states)
//! - [`SessionManager`]: register/login/logout, first resolution from the
//!   persisted session, push-based change subscriptions
//! - The [`IdentityProvider`] seam with a REST implementation and an
//!   in-memory one for tests and demos
//! - [`TokenSource`], handing valid ID tokens to data store clients

mod auth_fsm;
mod error;
mod provider;
mod session;
mod token_source;

pub use auth_fsm::auth_machine;
pub use auth_fsm::{AuthMachine, AuthMachineInput, AuthMachineState, SessionState, UserSession};
pub use error::{AuthError, AuthResult};
pub use provider::{IdentityProvider, MemoryIdentityProvider, ProviderSession, RestIdentityProvider};
pub use session::{SessionCallback, SessionManager, Subscription};
pub use token_source::TokenSource;
