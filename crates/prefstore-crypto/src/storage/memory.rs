use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

use super::{validate_alias, SecureKeyStorage};
use crate::{KeyStorageError, MasterKey};

/// Process-local key storage. Keys are lost when the storage is dropped.
#[derive(Default)]
pub struct InMemoryKeyStorage {
    keys: Mutex<HashMap<String, MasterKey>>,
    generated: AtomicUsize,
}

impl InMemoryKeyStorage {
    /// Create an empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys this storage has generated over its lifetime.
    pub fn generated_keys(&self) -> usize {
        self.generated.load(Ordering::SeqCst)
    }

    /// Drop the key stored under `alias`, as an external wipe of the key store would.
    pub fn remove(&self, alias: &str) -> bool {
        self.keys
            .lock()
            .expect("Mutex should not be poisoned")
            .remove(alias)
            .is_some()
    }
}

impl std::fmt::Debug for InMemoryKeyStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryKeyStorage")
            .field("generated", &self.generated_keys())
            .finish()
    }
}

#[async_trait::async_trait]
impl SecureKeyStorage for InMemoryKeyStorage {
    async fn load(&self, alias: &str) -> Result<Option<MasterKey>, KeyStorageError> {
        validate_alias(alias)?;
        Ok(self
            .keys
            .lock()
            .expect("Mutex should not be poisoned")
            .get(alias)
            .cloned())
    }

    async fn create(&self, alias: &str) -> Result<MasterKey, KeyStorageError> {
        validate_alias(alias)?;
        let mut keys = self.keys.lock().expect("Mutex should not be poisoned");
        if let Some(existing) = keys.get(alias) {
            return Ok(existing.clone());
        }

        let key = MasterKey::generate()?;
        keys.insert(alias.to_owned(), key.clone());
        self.generated.fetch_add(1, Ordering::SeqCst);
        Ok(key)
    }

    async fn contains(&self, alias: &str) -> Result<bool, KeyStorageError> {
        validate_alias(alias)?;
        Ok(self
            .keys
            .lock()
            .expect("Mutex should not be poisoned")
            .contains_key(alias))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_is_idempotent() {
        let storage = InMemoryKeyStorage::new();

        let first = storage.create("alias").await.unwrap();
        let second = storage.create("alias").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(storage.generated_keys(), 1);
    }

    #[tokio::test]
    async fn test_load_and_remove() {
        let storage = InMemoryKeyStorage::new();
        assert!(storage.load("alias").await.unwrap().is_none());

        let key = storage.create("alias").await.unwrap();
        assert_eq!(storage.load("alias").await.unwrap(), Some(key));
        assert!(storage.contains("alias").await.unwrap());

        assert!(storage.remove("alias"));
        assert!(!storage.contains("alias").await.unwrap());
        assert!(!storage.remove("alias"));
    }

    #[tokio::test]
    async fn test_rejects_invalid_alias() {
        let storage = InMemoryKeyStorage::new();
        assert!(matches!(
            storage.create("bad alias").await,
            Err(KeyStorageError::InvalidAlias(_))
        ));
    }
}
