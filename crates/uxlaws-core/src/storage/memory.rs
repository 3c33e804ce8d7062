//! In-memory credential store.
//!
//! Nothing survives the process. Used by tests and by sessions that should
//! not touch persistent storage.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use tracing::warn;

use super::{CredentialStore, StorageBackend};

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries. Returns 0 if the lock is poisoned.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn get(&self, key: &str) -> Option<String> {
        match self.entries.read() {
            Ok(entries) => entries.get(key).cloned(),
            Err(_) => {
                warn!(key, "Memory store lock poisoned during get");
                None
            }
        }
    }

    async fn set(&self, key: &str, value: &str) {
        match self.entries.write() {
            Ok(mut entries) => {
                entries.insert(key.to_string(), value.to_string());
            }
            Err(_) => warn!(key, "Memory store lock poisoned during set"),
        }
    }

    async fn remove(&self, key: &str) {
        match self.entries.write() {
            Ok(mut entries) => {
                entries.remove(key);
            }
            Err(_) => warn!(key, "Memory store lock poisoned during remove"),
        }
    }

    fn backend(&self) -> StorageBackend {
        StorageBackend::Memory
    }
}
