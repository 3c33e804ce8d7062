//! Application configuration management.
//!
//! This module handles loading and saving the client configuration: the API
//! base URL, which credential storage backend to use, the codec for the local
//! store and the last email used to sign in.
//!
//! Configuration is stored at `~/.config/uxlaws/config.json`.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::storage::{LocalCodec, StorageBackend};

/// Application name used for config/data directory paths
pub const APP_NAME: &str = "uxlaws";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Base URL every API call is made against unless overridden
pub const DEFAULT_API_BASE_URL: &str = "https://api.uxlaws.app/v1";

/// HTTP request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Environment variable overriding the API base URL
pub const ENV_API_URL: &str = "UXLAWS_API_URL";

/// Environment variable overriding the storage backend
pub const ENV_STORAGE: &str = "UXLAWS_STORAGE";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    pub api_base_url: Option<String>,
    pub storage: Option<StorageBackend>,
    pub local_codec: Option<LocalCodec>,
    pub request_timeout_secs: Option<u64>,
    pub last_email: Option<String>,
    /// Overrides the directory holding the local store (mostly for tests)
    #[serde(skip)]
    pub data_dir_override: Option<PathBuf>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply `UXLAWS_API_URL` and `UXLAWS_STORAGE` on top of the file values.
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(ENV_API_URL) {
            if !url.trim().is_empty() {
                self.api_base_url = Some(url);
            }
        }
        if let Ok(value) = std::env::var(ENV_STORAGE) {
            match value.parse::<StorageBackend>() {
                Ok(backend) => self.storage = Some(backend),
                Err(e) => warn!(value = %value, error = %e, "Ignoring invalid storage override"),
            }
        }
    }

    pub fn api_base_url(&self) -> &str {
        self.api_base_url
            .as_deref()
            .unwrap_or(DEFAULT_API_BASE_URL)
            .trim_end_matches('/')
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    /// Backend to use, falling back to the platform default.
    pub fn storage_backend(&self) -> StorageBackend {
        self.storage.unwrap_or_else(StorageBackend::detect)
    }

    pub fn local_codec(&self) -> LocalCodec {
        self.local_codec.unwrap_or_default()
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory holding the local credential store and its key file.
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.data_dir_override {
            return Ok(dir.clone());
        }
        let data_dir = dirs::data_local_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api_base_url(), DEFAULT_API_BASE_URL);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.local_codec(), LocalCodec::Obfuscated);
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let config = Config {
            api_base_url: Some("http://localhost:8080/api/".to_string()),
            ..Default::default()
        };
        assert_eq!(config.api_base_url(), "http://localhost:8080/api");
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = Config {
            api_base_url: Some("http://localhost:3000".to_string()),
            storage: Some(StorageBackend::Local),
            local_codec: Some(LocalCodec::Sealed),
            request_timeout_secs: Some(5),
            last_email: Some("ada@example.com".to_string()),
            data_dir_override: None,
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_gives_default() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Config::load_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(loaded, Config::default());
    }

    #[test]
    fn test_data_dir_override() {
        let config = Config {
            data_dir_override: Some(PathBuf::from("/tmp/uxlaws-test")),
            ..Default::default()
        };
        assert_eq!(config.data_dir().unwrap(), PathBuf::from("/tmp/uxlaws-test"));
    }

    // Process env is shared across test threads; every mutation stays in this one test.
    #[test]
    fn test_env_overrides() {
        std::env::set_var(ENV_API_URL, "http://localhost:9000/api/");
        std::env::set_var(ENV_STORAGE, "local");
        let mut config = Config::default();
        config.apply_env();
        assert_eq!(config.api_base_url(), "http://localhost:9000/api");
        assert_eq!(config.storage_backend(), StorageBackend::Local);

        std::env::set_var(ENV_API_URL, "  ");
        std::env::set_var(ENV_STORAGE, "floppy");
        let mut config = Config {
            api_base_url: Some("http://file.example".to_string()),
            storage: Some(StorageBackend::Keychain),
            ..Default::default()
        };
        config.apply_env();
        assert_eq!(config.api_base_url(), "http://file.example");
        assert_eq!(config.storage, Some(StorageBackend::Keychain));

        std::env::remove_var(ENV_API_URL);
        std::env::remove_var(ENV_STORAGE);
        let mut config = Config::default();
        config.apply_env();
        assert_eq!(config, Config::default());
    }
}
