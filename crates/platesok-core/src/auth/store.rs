//! Durable credential persistence.
//!
//! The session keeps three string entries in the store: the bearer token,
//! the username, and the user id. All three are written together on login
//! and removed together on logout; the hydration path treats any partial
//! record as invalid.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use keyring::Entry;

/// Store entry holding the bearer token.
pub const KEY_TOKEN: &str = "token";
/// Store entry holding the username.
pub const KEY_USER: &str = "user";
/// Store entry holding the user id.
pub const KEY_USER_ID: &str = "userId";

/// Credential file name in the data directory
const CREDENTIALS_FILE: &str = "credentials.json";

/// Key-value persistence for session credentials.
///
/// Implementations are injected into the session layer; the display layer
/// never talks to a store directly.
pub trait CredentialStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    /// Removing an absent entry is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

impl<S: CredentialStore + ?Sized> CredentialStore for std::sync::Arc<S> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }
}

/// File-backed store: one JSON object of string entries on disk.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(data_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;
        Ok(Self {
            path: data_dir.join(CREDENTIALS_FILE),
        })
    }

    fn read_entries(&self) -> Result<HashMap<String, String>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let contents = std::fs::read_to_string(&self.path)
            .context("Failed to read credentials file")?;
        serde_json::from_str(&contents).context("Failed to parse credentials file")
    }

    fn write_entries(&self, entries: &HashMap<String, String>) -> Result<()> {
        if entries.is_empty() {
            if self.path.exists() {
                std::fs::remove_file(&self.path).context("Failed to remove credentials file")?;
            }
            return Ok(());
        }
        let contents = serde_json::to_string_pretty(entries)?;
        std::fs::write(&self.path, contents).context("Failed to write credentials file")?;
        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_entries()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.read_entries()?;
        entries.insert(key.to_string(), value.to_string());
        self.write_entries(&entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.read_entries()?;
        if entries.remove(key).is_some() {
            self.write_entries(&entries)?;
        }
        Ok(())
    }
}

/// OS keychain-backed store, one keychain entry per credential key.
pub struct KeyringCredentialStore {
    service: String,
}

impl KeyringCredentialStore {
    pub fn new(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry> {
        Entry::new(&self.service, key).context("Failed to create keyring entry")
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to read credential from keychain"),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entry(key)?
            .set_password(value)
            .context("Failed to store credential in keychain")
    }

    fn remove(&self, key: &str) -> Result<()> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete credential from keychain"),
        }
    }
}

/// In-memory store for tests and embedders that manage persistence
/// themselves.
#[derive(Default)]
pub struct MemoryCredentialStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seed an entry, e.g. to exercise hydration.
    pub fn seed(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_empty()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileCredentialStore::new(dir.path().to_path_buf()).expect("store");

        assert_eq!(store.get(KEY_TOKEN).unwrap(), None);

        store.set(KEY_TOKEN, "T").unwrap();
        store.set(KEY_USER, "alice").unwrap();
        store.set(KEY_USER_ID, "U").unwrap();
        assert_eq!(store.get(KEY_TOKEN).unwrap().as_deref(), Some("T"));
        assert_eq!(store.get(KEY_USER).unwrap().as_deref(), Some("alice"));

        store.remove(KEY_TOKEN).unwrap();
        store.remove(KEY_USER).unwrap();
        store.remove(KEY_USER_ID).unwrap();
        assert_eq!(store.get(KEY_USER_ID).unwrap(), None);
        // all entries gone means the file is gone too
        assert!(!dir.path().join(CREDENTIALS_FILE).exists());
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let store = FileCredentialStore::new(dir.path().to_path_buf()).expect("store");
            store.set(KEY_TOKEN, "T").unwrap();
        }
        let reopened = FileCredentialStore::new(dir.path().to_path_buf()).expect("store");
        assert_eq!(reopened.get(KEY_TOKEN).unwrap().as_deref(), Some("T"));
    }

    #[test]
    fn test_remove_absent_entry_is_ok() {
        let store = MemoryCredentialStore::new();
        store.remove(KEY_TOKEN).unwrap();
        store.set(KEY_TOKEN, "T").unwrap();
        store.remove(KEY_TOKEN).unwrap();
        store.remove(KEY_TOKEN).unwrap();
        assert!(store.is_empty());
    }
}
