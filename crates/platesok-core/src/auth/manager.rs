//! Session lifecycle management.
//!
//! `SessionManager` owns the session against the remote auth service:
//! hydration from the credential store at construction, login and
//! registration, idempotent logout, and the liveness monitor tied to the
//! authenticated state. The display layer receives a manager by
//! dependency injection and consumes sessions through it.

use std::sync::Mutex;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use crate::api::{ApiClient, ApiError};
use crate::config::Config;

use super::monitor::LivenessMonitor;
use super::session::{SessionData, SessionHandle};
use super::store::CredentialStore;

/// Message surfaced when the service rejects a login.
const LOGIN_FAILED: &str = "Login failed.";

/// Message surfaced when the service rejects a registration.
const REGISTRATION_FAILED: &str = "Registration failed.";

/// Login or registration rejected. Carries a human-readable message for
/// the display layer and the underlying failure as source.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct AuthError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AuthError {
    fn rejected(message: &str, source: ApiError) -> Self {
        Self {
            message: message.to_string(),
            source: Some(Box::new(source)),
        }
    }

    fn internal(message: &str, source: anyhow::Error) -> Self {
        Self {
            message: message.to_string(),
            source: Some(source.into()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

pub struct SessionManager {
    client: ApiClient,
    session: SessionHandle,
    monitor: Mutex<Option<LivenessMonitor>>,
    probe_interval: Duration,
}

impl SessionManager {
    /// Build a manager, hydrating the session from the credential store
    /// without contacting the remote service. A persisted token is
    /// trusted until the first probe or protected request says otherwise.
    ///
    /// Must be called from within a Tokio runtime; when the hydrated
    /// session is authenticated the liveness monitor starts immediately.
    pub fn new(config: &Config, store: Box<dyn CredentialStore>) -> Result<Self, ApiError> {
        let session = SessionHandle::new(store);
        let client = ApiClient::new(&config.api_base_url, session.clone())?;
        let manager = Self {
            client,
            session,
            monitor: Mutex::new(None),
            probe_interval: config.probe_interval(),
        };
        if manager.session.is_authenticated() {
            manager.start_monitor();
        }
        Ok(manager)
    }

    /// Authenticate and populate the session. A fresh anti-forgery token
    /// is fetched before the credentials are submitted; on success all
    /// three credential entries are persisted together and polling
    /// starts. On rejection the session is left unchanged.
    pub async fn login(&self, username: &str, password: &str) -> Result<SessionData, AuthError> {
        let csrf_token = self
            .client
            .fetch_csrf_token()
            .await
            .map_err(|e| AuthError::rejected(LOGIN_FAILED, e))?;

        let response = self
            .client
            .submit_login(username, password, &csrf_token)
            .await
            .map_err(|e| {
                warn!(user = %username, error = %e, "login rejected");
                AuthError::rejected(LOGIN_FAILED, e)
            })?;

        let data = SessionData {
            username: username.to_string(),
            user_id: response.user_id,
            token: response.token,
        };
        self.session
            .set(data.clone())
            .map_err(|e| AuthError::internal(LOGIN_FAILED, e))?;

        info!(user = %data.username, "login succeeded");
        self.start_monitor();
        Ok(data)
    }

    /// Submit a registration. Does not alter the session or the
    /// credential store, and does not log the new account in.
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        email: &str,
    ) -> Result<(), AuthError> {
        let csrf_token = self
            .client
            .fetch_csrf_token()
            .await
            .map_err(|e| AuthError::rejected(REGISTRATION_FAILED, e))?;

        self.client
            .submit_register(username, password, email, &csrf_token)
            .await
            .map_err(|e| {
                warn!(user = %username, error = %e, "registration rejected");
                AuthError::rejected(REGISTRATION_FAILED, e)
            })?;

        info!(user = %username, "registration submitted");
        Ok(())
    }

    /// Clear the session and the credential store, and stop polling.
    /// Always succeeds and is safe to call repeatedly.
    pub fn logout(&self) {
        self.stop_monitor();
        if self.session.clear() {
            info!("logged out");
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    /// Snapshot of the current session for the display layer.
    pub fn session(&self) -> Option<SessionData> {
        self.session.snapshot()
    }

    /// The request decorator. Lookup and history calls go through here so
    /// they carry the session credentials.
    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Whether the liveness monitor is currently polling.
    pub fn is_polling(&self) -> bool {
        self.monitor
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|m| !m.is_finished())
            .unwrap_or(false)
    }

    fn start_monitor(&self) {
        let mut slot = self.monitor.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(old) = slot.take() {
            old.stop();
        }
        *slot = Some(LivenessMonitor::spawn(
            self.client.clone(),
            self.session.clone(),
            self.probe_interval,
        ));
    }

    fn stop_monitor(&self) {
        let mut slot = self.monitor.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(monitor) = slot.take() {
            monitor.stop();
        }
    }
}

impl Drop for SessionManager {
    /// Teardown stops polling on every exit path. The persisted
    /// credential record is left intact for the next start.
    fn drop(&mut self) {
        self.stop_monitor();
    }
}
