//! Credential storage for the bearer token and the cached user profile.
//!
//! This module provides:
//! - `CredentialStore`: the uniform async `get/set/remove` contract
//! - `KeychainStore`: OS secure storage via keyring (native targets)
//! - `LocalStore`: a key-value file whose values pass through a `ValueCodec`
//! - `MemoryStore`: an in-process map for tests and throwaway sessions
//!
//! The store never surfaces errors to callers. Backend failures are logged
//! and read as "absent", so a broken store degrades to an unauthenticated
//! client rather than a failed request.

pub mod codec;
pub mod keychain;
pub mod local;
pub mod memory;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::Config;

pub use codec::{ObfuscationCodec, SealedCodec, ValueCodec};
pub use keychain::KeychainStore;
pub use local::LocalStore;
pub use memory::MemoryStore;

/// Key holding the bearer token
pub const TOKEN_KEY: &str = "token";

/// Key holding the JSON-serialized cached user
pub const USER_KEY: &str = "user";

/// Errors raised inside storage backends.
///
/// These never cross the `CredentialStore` boundary; backends log them and
/// fall back to absence.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Keychain error: {0}")]
    Keychain(#[from] keyring::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt store file: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("Failed to encode store file: {0}")]
    Encode(serde_json::Error),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Encryption failed")]
    Encryption,
}

/// Key-value persistence for credentials.
///
/// Implementations must not fail: `get` returns `None` on any error,
/// `set` and `remove` silently do nothing.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;

    async fn set(&self, key: &str, value: &str);

    async fn remove(&self, key: &str);

    /// Short backend name for diagnostics
    fn backend(&self) -> StorageBackend;
}

/// Which mechanism backs the credential store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Keychain,
    Local,
    Memory,
}

impl StorageBackend {
    /// Platform default: browser-hosted builds have no OS keychain.
    pub fn detect() -> Self {
        if cfg!(target_arch = "wasm32") {
            StorageBackend::Local
        } else {
            StorageBackend::Keychain
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StorageBackend::Keychain => "keychain",
            StorageBackend::Local => "local",
            StorageBackend::Memory => "memory",
        };
        f.write_str(name)
    }
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keychain" | "native" => Ok(StorageBackend::Keychain),
            "local" | "web" => Ok(StorageBackend::Local),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(format!("unknown storage backend '{}'", other)),
        }
    }
}

/// Value transform used by the local store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocalCodec {
    #[default]
    Obfuscated,
    Sealed,
}

/// Open the credential store selected by `config`.
///
/// The backend is decided once here; callers only see the trait object.
pub fn open_store(config: &Config) -> Result<Arc<dyn CredentialStore>> {
    let backend = config.storage_backend();
    debug!(%backend, "Opening credential store");

    let store: Arc<dyn CredentialStore> = match backend {
        StorageBackend::Keychain => Arc::new(KeychainStore::new()),
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
        StorageBackend::Local => {
            let dir = config.data_dir()?;
            match config.local_codec() {
                LocalCodec::Obfuscated => Arc::new(LocalStore::open(&dir, ObfuscationCodec)),
                LocalCodec::Sealed => {
                    Arc::new(LocalStore::open(&dir, SealedCodec::load_or_create(&dir)?))
                }
            }
        }
    };
    Ok(store)
}

/// Remove both the token and the cached user.
pub async fn purge_credentials(store: &dyn CredentialStore) {
    futures::join!(store.remove(TOKEN_KEY), store.remove(USER_KEY));
}
