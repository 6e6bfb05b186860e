//! Application configuration management.
//!
//! This module handles loading and saving the application configuration,
//! which includes the lookup service base URL, the liveness probe period,
//! and the last used username.
//!
//! Configuration is stored at `~/.config/platesok/config.json`. The base
//! URL can be overridden with the `PLATESOK_API_URL` environment variable.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Application name used for config/data directory paths
const APP_NAME: &str = "platesok";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding the base URL
const API_URL_ENV: &str = "PLATESOK_API_URL";

/// Default base URL of the lookup service
const DEFAULT_API_BASE_URL: &str = "http://localhost:8082";

/// Default liveness probe period in seconds.
/// 5s detects a revoked token quickly without noticeable load.
const DEFAULT_PROBE_INTERVAL_SECS: u64 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api_base_url: String,
    pub probe_interval_secs: u64,
    pub last_username: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            probe_interval_secs: DEFAULT_PROBE_INTERVAL_SECS,
            last_username: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config: Self = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            Self::default()
        };

        if let Ok(url) = std::env::var(API_URL_ENV) {
            config.api_base_url = url;
        }
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory for the file-backed credential store.
    pub fn data_dir(&self) -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.probe_interval(), Duration::from_secs(5));
        assert_eq!(config.last_username, None);
    }

    #[test]
    fn test_round_trip_through_json() {
        let config = Config {
            api_base_url: "https://lookup.example.com".to_string(),
            probe_interval_secs: 30,
            last_username: Some("alice".to_string()),
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.api_base_url, config.api_base_url);
        assert_eq!(parsed.probe_interval_secs, 30);
        assert_eq!(parsed.last_username.as_deref(), Some("alice"));
    }
}
