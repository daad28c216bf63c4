//! Client configuration.
//!
//! Settings come from the environment (a `.env` file is honoured by the
//! CLI). Session files live under the platform data directory, e.g.
//! `~/.local/share/authrelay/` on Linux, unless overridden.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::api::DEFAULT_REQUEST_TIMEOUT;
use crate::auth::DEFAULT_REFRESH_COOLDOWN;

/// Application name used for data directory paths and the keychain service
pub const APP_NAME: &str = "authrelay";

/// API root used when `AUTHRELAY_API_URL` is not set
pub const DEFAULT_API_URL: &str = "http://localhost:3030/v1";

pub const ENV_API_URL: &str = "AUTHRELAY_API_URL";
pub const ENV_REFRESH_COOLDOWN_MS: &str = "AUTHRELAY_REFRESH_COOLDOWN_MS";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "AUTHRELAY_REQUEST_TIMEOUT_SECS";
pub const ENV_STORAGE_DIR: &str = "AUTHRELAY_STORAGE_DIR";
pub const ENV_KEEP_SESSION_ON_REJECTION: &str = "AUTHRELAY_KEEP_SESSION_ON_REFRESH_REJECTION";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub refresh_cooldown: Duration,
    pub request_timeout: Duration,
    pub storage_dir: Option<PathBuf>,
    pub clear_session_on_refresh_rejection: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            refresh_cooldown: DEFAULT_REFRESH_COOLDOWN,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            storage_dir: None,
            clear_session_on_refresh_rejection: true,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup; unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            config.base_url = url.trim().to_string();
        }
        if let Some(ms) = lookup(ENV_REFRESH_COOLDOWN_MS) {
            let ms: u64 = ms
                .trim()
                .parse()
                .with_context(|| format!("{} must be a number of milliseconds", ENV_REFRESH_COOLDOWN_MS))?;
            config.refresh_cooldown = Duration::from_millis(ms);
        }
        if let Some(secs) = lookup(ENV_REQUEST_TIMEOUT_SECS) {
            let secs: u64 = secs
                .trim()
                .parse()
                .with_context(|| format!("{} must be a number of seconds", ENV_REQUEST_TIMEOUT_SECS))?;
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(dir) = lookup(ENV_STORAGE_DIR).filter(|v| !v.trim().is_empty()) {
            config.storage_dir = Some(PathBuf::from(dir));
        }
        if let Some(keep) = lookup(ENV_KEEP_SESSION_ON_REJECTION) {
            config.clear_session_on_refresh_rejection =
                !matches!(keep.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }

        Ok(config)
    }

    /// Directory holding the persisted session keys
    pub fn storage_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.storage_dir {
            return Ok(dir.clone());
        }
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.base_url, "http://localhost:3030/v1");
        assert_eq!(config.refresh_cooldown, Duration::from_millis(20_000));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_overrides() {
        let config = ClientConfig::from_lookup(lookup(&[
            (ENV_API_URL, "https://api.example.com/v2"),
            (ENV_REFRESH_COOLDOWN_MS, "5000"),
            (ENV_REQUEST_TIMEOUT_SECS, " 10 "),
            (ENV_STORAGE_DIR, "/tmp/authrelay-test"),
            (ENV_KEEP_SESSION_ON_REJECTION, "true"),
        ]))
        .unwrap();
        assert_eq!(config.base_url, "https://api.example.com/v2");
        assert_eq!(config.refresh_cooldown, Duration::from_millis(5000));
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.storage_dir().unwrap(), PathBuf::from("/tmp/authrelay-test"));
        assert!(!config.clear_session_on_refresh_rejection);
    }

    #[test]
    fn test_invalid_cooldown_is_an_error() {
        let err = ClientConfig::from_lookup(lookup(&[(ENV_REFRESH_COOLDOWN_MS, "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_REFRESH_COOLDOWN_MS));
    }
}
