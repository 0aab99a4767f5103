//! Application configuration management.
//!
//! This module handles loading and saving the application configuration:
//! backend URL, request timeout, cache TTL and storage capacity.
//!
//! Configuration is stored at `~/.config/schoolcache/config.json`.
//! `SCHOOLCACHE_API_BASE_URL` and `SCHOOLCACHE_TIMEOUT_MS` override the
//! file when set.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::api::client::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT_MS};
use crate::api::ApiClient;
use crate::cache::{CacheManager, DEFAULT_TTL_MS};
use crate::chat::DEFAULT_REPLY_DELAY_MS;
use crate::store::{FileStore, DEFAULT_CAPACITY_BYTES};

/// Application name used for config/storage directory paths
const APP_NAME: &str = "schoolcache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Durable store file name
const STORAGE_FILE: &str = "storage.json";

pub const ENV_BASE_URL: &str = "SCHOOLCACHE_API_BASE_URL";
pub const ENV_TIMEOUT_MS: &str = "SCHOOLCACHE_TIMEOUT_MS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub request_timeout_ms: u64,
    pub cache_ttl_ms: i64,
    pub store_capacity_bytes: usize,
    pub chat_reply_delay_ms: u64,
    /// Write a daily log file here in addition to stderr
    pub log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_ms: DEFAULT_TIMEOUT_MS,
            cache_ttl_ms: DEFAULT_TTL_MS,
            store_capacity_bytes: DEFAULT_CAPACITY_BYTES,
            chat_reply_delay_ms: DEFAULT_REPLY_DELAY_MS,
            log_dir: None,
        }
    }
}

impl Config {
    /// Load from the default location, then apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            debug!(path = %path.display(), "No config file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply overrides from `lookup` (normally the process environment).
    /// Unparseable values are ignored with a warning.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_BASE_URL).filter(|v| !v.trim().is_empty()) {
            self.api_base_url = url.trim().to_string();
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_MS) {
            match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => self.request_timeout_ms = ms,
                _ => warn!(value = %raw, "Ignoring invalid {}", ENV_TIMEOUT_MS),
            }
        }
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn storage_path(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME).join(STORAGE_FILE))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn chat_reply_delay(&self) -> Duration {
        Duration::from_millis(self.chat_reply_delay_ms)
    }

    /// Build a client whose cache lives in the store file at `storage_path`
    pub fn build_client_at(&self, storage_path: &Path) -> Result<ApiClient> {
        let store = FileStore::open_with_capacity(storage_path, self.store_capacity_bytes)
            .with_context(|| format!("Failed to open storage: {}", storage_path.display()))?;
        let cache = CacheManager::new(store).with_ttl(self.cache_ttl_ms);
        ApiClient::new(&self.api_base_url, self.request_timeout(), cache)
            .context("Failed to create API client")
    }

    pub fn build_client(&self) -> Result<ApiClient> {
        self.build_client_at(&self.storage_path()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api_base_url, "http://localhost:8000");
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.cache_ttl_ms, 300_000);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"api_base_url": "http://school.local"}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.api_base_url, "http://school.local");
        assert_eq!(config.request_timeout_ms, DEFAULT_TIMEOUT_MS);
    }

    #[test]
    fn test_save_roundtrip_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        assert_eq!(Config::load_from(&path).unwrap(), Config::default());

        let config = Config {
            chat_reply_delay_ms: 10,
            ..Default::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_overrides() {
        let mut config = Config::default();
        config.apply_overrides(|name| match name {
            ENV_BASE_URL => Some("http://api.school.test ".to_string()),
            ENV_TIMEOUT_MS => Some("2500".to_string()),
            _ => None,
        });
        assert_eq!(config.api_base_url, "http://api.school.test");
        assert_eq!(config.request_timeout_ms, 2500);

        config.apply_overrides(|name| (name == ENV_TIMEOUT_MS).then(|| "soon".to_string()));
        assert_eq!(config.request_timeout_ms, 2500);
    }

    #[test]
    fn test_build_client_uses_storage_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        let client = Config::default().build_client_at(&path).unwrap();
        client.cache().save("GET_/get_events", &serde_json::json!([])).unwrap();
        assert!(path.exists());
    }
}
