//! Authentication module for managing the user session lifecycle.
//!
//! This module provides:
//! - `SessionManager`: login, registration and logout against the remote
//!   auth service, plus ownership of the liveness monitor
//! - `SessionHandle`/`SessionData`: shared in-memory session state
//! - `CredentialStore`: durable persistence for session credentials
//! - `LivenessMonitor`: periodic token liveness probing
//!
//! Sessions are persisted across restarts and expire server-side; a 401
//! anywhere on protected traffic returns the session to the
//! unauthenticated state.

pub mod manager;
pub mod monitor;
pub mod session;
pub mod store;

pub use manager::{AuthError, SessionManager};
pub use monitor::LivenessMonitor;
pub use session::{SessionData, SessionHandle};
pub use store::{
    CredentialStore, FileCredentialStore, KeyringCredentialStore, MemoryCredentialStore,
};
