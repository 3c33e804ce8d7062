//! File-backed key-value store, the native stand-in for browser local storage.
//!
//! All entries live in one JSON object at `<dir>/local_storage.json`. Values
//! are written through a `ValueCodec`, keys are stored as-is.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::codec::ValueCodec;
use super::{CredentialStore, StorageBackend, StorageError};

/// Store file name in the data directory
const STORE_FILE: &str = "local_storage.json";

type Entries = BTreeMap<String, String>;

pub struct LocalStore<C> {
    path: PathBuf,
    codec: C,
    // Serializes read-modify-write cycles on the store file
    lock: Mutex<()>,
}

impl<C: ValueCodec> LocalStore<C> {
    /// Open the store in `dir`. The file is created on first write.
    pub fn open(dir: &Path, codec: C) -> Self {
        Self {
            path: dir.join(STORE_FILE),
            codec,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Entries, StorageError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) if contents.trim().is_empty() => Ok(Entries::new()),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Entries::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn persist(&self, entries: &Entries) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let contents = serde_json::to_string_pretty(entries).map_err(StorageError::Encode)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, contents).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Load for modification; a corrupt file is replaced rather than kept.
    async fn load_for_update(&self) -> Result<Entries, StorageError> {
        match self.load().await {
            Err(StorageError::Corrupt(e)) => {
                warn!(path = %self.path.display(), error = %e, "Discarding corrupt local store");
                Ok(Entries::new())
            }
            other => other,
        }
    }

    async fn try_set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let encoded = self.codec.encode(value)?;
        let _guard = self.lock.lock().await;
        let mut entries = self.load_for_update().await?;
        entries.insert(key.to_string(), encoded);
        self.persist(&entries).await
    }

    async fn try_remove(&self, key: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load_for_update().await?;
        if entries.remove(key).is_some() {
            self.persist(&entries).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl<C: ValueCodec> CredentialStore for LocalStore<C> {
    async fn get(&self, key: &str) -> Option<String> {
        let entries = {
            let _guard = self.lock.lock().await;
            self.load().await
        };
        match entries {
            Ok(entries) => entries.get(key).map(|stored| self.codec.decode(stored)),
            Err(e) => {
                warn!(key, error = %e, "Failed to read local store");
                None
            }
        }
    }

    async fn set(&self, key: &str, value: &str) {
        match self.try_set(key, value).await {
            Ok(()) => debug!(key, "Stored value in local store"),
            Err(e) => warn!(key, error = %e, "Failed to write local store"),
        }
    }

    async fn remove(&self, key: &str) {
        if let Err(e) = self.try_remove(key).await {
            warn!(key, error = %e, "Failed to remove from local store");
        }
    }

    fn backend(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
