//! Core library for platesok, a client for a license-plate lookup
//! service.
//!
//! The crate owns the session/authentication lifecycle and the
//! authenticated API client; a display layer (web UI, TUI) consumes both
//! by dependency injection and never talks to the credential store or the
//! remote service directly.
//!
//! Typical wiring:
//!
//! ```no_run
//! use platesok_core::{Config, FileCredentialStore, SessionManager};
//!
//! # async fn wire() -> anyhow::Result<()> {
//! let config = Config::load()?;
//! let store = FileCredentialStore::new(config.data_dir()?)?;
//! let sessions = SessionManager::new(&config, Box::new(store))?;
//!
//! if !sessions.is_authenticated() {
//!     sessions.login("alice", "secret").await?;
//! }
//! let vehicle = sessions.client().fetch_vehicle_simple("AB 12345").await?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

pub use api::{ApiClient, ApiError};
pub use auth::{
    AuthError, CredentialStore, FileCredentialStore, KeyringCredentialStore, LivenessMonitor,
    MemoryCredentialStore, SessionData, SessionHandle, SessionManager,
};
pub use config::Config;
pub use models::{DetailedVehicleData, SearchHistoryItem, SimpleVehicleData};
