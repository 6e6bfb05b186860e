//! Shared in-memory session state.
//!
//! The session is either fully populated or empty; observers never see a
//! partially written snapshot. All mutation goes through [`SessionHandle`],
//! which also keeps the credential store in step with the in-memory state.

use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::store::{CredentialStore, KEY_TOKEN, KEY_USER, KEY_USER_ID};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    pub username: String,
    pub user_id: String,
    pub token: String,
}

impl SessionData {
    /// Role claims from the bearer token payload.
    ///
    /// The token is treated as opaque unless it happens to be a readable
    /// JWT; a malformed or foreign token yields no roles, never an error.
    pub fn roles(&self) -> Vec<String> {
        #[derive(Deserialize)]
        struct Claims {
            #[serde(default)]
            roles: Vec<String>,
        }

        let payload = match self.token.split('.').nth(1) {
            Some(payload) => payload,
            None => return Vec::new(),
        };
        let bytes = match URL_SAFE_NO_PAD.decode(payload) {
            Ok(bytes) => bytes,
            Err(_) => return Vec::new(),
        };
        match serde_json::from_slice::<Claims>(&bytes) {
            Ok(claims) => claims.roles,
            Err(_) => Vec::new(),
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles().iter().any(|r| r == role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role("ADMIN")
    }
}

struct SessionInner {
    data: Option<SessionData>,
    store: Box<dyn CredentialStore>,
}

/// Cloneable handle to the shared session state.
///
/// The request decorator, the liveness monitor, and the display layer all
/// read through clones of the same handle; only the session manager (and
/// the idempotent [`SessionHandle::clear`]) mutate it.
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<Mutex<SessionInner>>,
}

impl SessionHandle {
    /// Create the session, hydrating it from the credential store without
    /// contacting the remote service. A partial credential record is
    /// invalid and is cleared defensively.
    pub fn new(store: Box<dyn CredentialStore>) -> Self {
        let data = Self::hydrate(store.as_ref());
        Self {
            inner: Arc::new(Mutex::new(SessionInner { data, store })),
        }
    }

    fn hydrate(store: &dyn CredentialStore) -> Option<SessionData> {
        let token = Self::read_entry(store, KEY_TOKEN);
        let username = Self::read_entry(store, KEY_USER);
        let user_id = Self::read_entry(store, KEY_USER_ID);

        match (token, username, user_id) {
            (Some(token), Some(username), Some(user_id)) => {
                debug!(user = %username, "session hydrated from credential store");
                Some(SessionData {
                    username,
                    user_id,
                    token,
                })
            }
            (None, None, None) => None,
            _ => {
                warn!("partial credential record found, clearing");
                Self::remove_entries(store);
                None
            }
        }
    }

    fn read_entry(store: &dyn CredentialStore, key: &str) -> Option<String> {
        match store.get(key) {
            Ok(value) => value,
            Err(error) => {
                warn!(%error, key, "failed to read credential entry");
                None
            }
        }
    }

    fn remove_entries(store: &dyn CredentialStore) {
        for key in [KEY_TOKEN, KEY_USER, KEY_USER_ID] {
            if let Err(error) = store.remove(key) {
                warn!(%error, key, "failed to remove credential entry");
            }
        }
    }

    // A poisoned lock only means some other observer panicked; the state
    // itself is a plain value and stays usable.
    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Replace the session and persist all three credential entries
    /// together. On a persistence failure the store is swept clean and the
    /// in-memory session is left untouched.
    pub(crate) fn set(&self, data: SessionData) -> Result<()> {
        let mut inner = self.lock();
        if let Err(error) = Self::persist(inner.store.as_ref(), &data) {
            Self::remove_entries(inner.store.as_ref());
            return Err(error);
        }
        inner.data = Some(data);
        Ok(())
    }

    fn persist(store: &dyn CredentialStore, data: &SessionData) -> Result<()> {
        store.set(KEY_TOKEN, &data.token)?;
        store.set(KEY_USER, &data.username)?;
        store.set(KEY_USER_ID, &data.user_id)?;
        Ok(())
    }

    /// Clear the session and the credential store. Idempotent; returns
    /// true only for the call that actually cleared an authenticated
    /// session.
    pub fn clear(&self) -> bool {
        let mut inner = self.lock();
        let was_authenticated = inner.data.take().is_some();
        Self::remove_entries(inner.store.as_ref());
        was_authenticated
    }

    pub fn snapshot(&self) -> Option<SessionData> {
        self.lock().data.clone()
    }

    pub fn token(&self) -> Option<String> {
        self.lock().data.as_ref().map(|d| d.token.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.lock().data.is_some()
    }
}
