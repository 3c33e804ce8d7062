use std::sync::Arc;

use async_trait::async_trait;
use keyring::credential::{CredentialBuilder, CredentialBuilderApi};
use keyring::Entry;
use tracing::warn;

use super::{CredentialStore, StorageBackend, StorageError};

const SERVICE_NAME: &str = "uxlaws";

/// Credential store backed by the OS keychain.
///
/// Values are stored verbatim; the platform encrypts them at rest.
#[derive(Clone)]
pub struct KeychainStore {
    service: String,
    // None uses keyring's platform default
    builder: Option<Arc<CredentialBuilder>>,
}

impl KeychainStore {
    pub fn new() -> Self {
        Self::with_service(SERVICE_NAME)
    }

    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            builder: None,
        }
    }

    /// Build entries through `builder` instead of the platform keychain
    pub fn with_credential_builder(
        service: impl Into<String>,
        builder: Arc<CredentialBuilder>,
    ) -> Self {
        Self {
            service: service.into(),
            builder: Some(builder),
        }
    }

    fn read(entry: Entry) -> Result<Option<String>, StorageError> {
        match entry.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn delete(entry: Entry) -> Result<(), StorageError> {
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Run a blocking keychain call for `key` off the async runtime.
    async fn with_entry<T, F>(&self, key: &str, op: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(Entry) -> Result<T, StorageError> + Send + 'static,
    {
        let service = self.service.clone();
        let key = key.to_string();
        let builder = self.builder.clone();
        tokio::task::spawn_blocking(move || {
            let entry = match builder {
                Some(builder) => Entry::new_with_credential(builder.build(None, &service, &key)?),
                None => Entry::new(&service, &key)?,
            };
            op(entry)
        })
        .await?
    }
}

impl Default for KeychainStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialStore for KeychainStore {
    async fn get(&self, key: &str) -> Option<String> {
        match self.with_entry(key, Self::read).await {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "Failed to read from keychain");
                None
            }
        }
    }

    async fn set(&self, key: &str, value: &str) {
        let value = value.to_string();
        let result = self
            .with_entry(key, move |entry| Ok(entry.set_password(&value)?))
            .await;
        if let Err(e) = result {
            warn!(key, error = %e, "Failed to write to keychain");
        }
    }

    async fn remove(&self, key: &str) {
        if let Err(e) = self.with_entry(key, Self::delete).await {
            warn!(key, error = %e, "Failed to delete from keychain");
        }
    }

    fn backend(&self) -> StorageBackend {
        StorageBackend::Keychain
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::Any;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use keyring::credential::{Credential, CredentialApi};

    type Vault = Arc<Mutex<HashMap<(String, String), Vec<u8>>>>;

    /// Keychain stand-in where entries for the same service/user share state
    #[derive(Debug, Default)]
    struct SharedVault {
        vault: Vault,
    }

    #[derive(Debug)]
    struct VaultCredential {
        vault: Vault,
        id: (String, String),
    }

    impl CredentialApi for VaultCredential {
        fn set_password(&self, password: &str) -> keyring::Result<()> {
            self.set_secret(password.as_bytes())
        }

        fn set_secret(&self, secret: &[u8]) -> keyring::Result<()> {
            self.vault
                .lock()
                .unwrap()
                .insert(self.id.clone(), secret.to_vec());
            Ok(())
        }

        fn get_password(&self) -> keyring::Result<String> {
            let secret = self.get_secret()?;
            String::from_utf8(secret).map_err(|e| keyring::Error::BadEncoding(e.into_bytes()))
        }

        fn get_secret(&self) -> keyring::Result<Vec<u8>> {
            self.vault
                .lock()
                .unwrap()
                .get(&self.id)
                .cloned()
                .ok_or(keyring::Error::NoEntry)
        }

        fn delete_credential(&self) -> keyring::Result<()> {
            self.vault
                .lock()
                .unwrap()
                .remove(&self.id)
                .map(|_| ())
                .ok_or(keyring::Error::NoEntry)
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    impl CredentialBuilderApi for SharedVault {
        fn build(
            &self,
            _target: Option<&str>,
            service: &str,
            user: &str,
        ) -> keyring::Result<Box<Credential>> {
            Ok(Box::new(VaultCredential {
                vault: self.vault.clone(),
                id: (service.to_string(), user.to_string()),
            }))
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    /// Keychain that refuses every access, like a locked login keyring
    #[derive(Debug)]
    struct LockedKeychain;

    impl CredentialBuilderApi for LockedKeychain {
        fn build(
            &self,
            _target: Option<&str>,
            _service: &str,
            _user: &str,
        ) -> keyring::Result<Box<Credential>> {
            Err(keyring::Error::Invalid(
                "keychain".to_string(),
                "locked".to_string(),
            ))
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn vault_store() -> (KeychainStore, Vault) {
        let shared = SharedVault::default();
        let vault = shared.vault.clone();
        let store = KeychainStore::with_credential_builder("uxlaws-test", Arc::new(shared));
        (store, vault)
    }

    #[tokio::test]
    async fn test_set_get_remove_roundtrip() {
        let (store, vault) = vault_store();

        store.set("token", "abc123").await;
        assert_eq!(store.get("token").await.as_deref(), Some("abc123"));
        assert!(vault
            .lock()
            .unwrap()
            .contains_key(&("uxlaws-test".to_string(), "token".to_string())));

        store.remove("token").await;
        assert_eq!(store.get("token").await, None);
        assert!(vault.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_keys_are_separate_entries() {
        let (store, _) = vault_store();

        store.set("token", "abc123").await;
        store.set("user", "{\"id\":\"u1\"}").await;
        store.remove("token").await;

        assert_eq!(store.get("token").await, None);
        assert_eq!(store.get("user").await.as_deref(), Some("{\"id\":\"u1\"}"));
    }

    #[tokio::test]
    async fn test_missing_entry_reads_as_absent() {
        let (store, _) = vault_store();
        assert_eq!(store.get("token").await, None);
        store.remove("token").await;
        assert_eq!(store.get("token").await, None);
    }

    #[tokio::test]
    async fn test_locked_keychain_degrades_to_absent() {
        let store = KeychainStore::with_credential_builder("uxlaws-test", Arc::new(LockedKeychain));

        store.set("token", "abc123").await;
        assert_eq!(store.get("token").await, None);
        store.remove("token").await;
        assert_eq!(store.backend(), StorageBackend::Keychain);
    }
}
