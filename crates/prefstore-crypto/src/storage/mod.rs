//! Secure storage for master keys.
//!
//! A [SecureKeyStorage] stands in for the operating system or hardware key store. Keys are
//! addressed by alias and, once created, are never overwritten by this crate.

use std::{path::PathBuf, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{KeyStorageError, MasterKey};

mod file;
#[cfg(feature = "keyring")]
mod keyring_store;
mod memory;

pub use file::FileKeyStorage;
#[cfg(feature = "keyring")]
pub use keyring_store::KeyringKeyStorage;
pub use memory::InMemoryKeyStorage;

/// This trait represents a backend capable of holding master keys by alias.
#[async_trait::async_trait]
pub trait SecureKeyStorage: Send + Sync {
    /// Fetch the key stored under `alias`, if any.
    async fn load(&self, alias: &str) -> Result<Option<MasterKey>, KeyStorageError>;

    /// Generate and persist a key for `alias`. If a key already exists it is returned unchanged.
    async fn create(&self, alias: &str) -> Result<MasterKey, KeyStorageError>;

    /// Check whether a key is stored under `alias`.
    ///
    /// The engine calls this before every use of a cached key, so backends should keep it cheap.
    async fn contains(&self, alias: &str) -> Result<bool, KeyStorageError>;
}

/// Selects the [SecureKeyStorage] backend used by an application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KeyStorageConfiguration {
    /// Keys live in process memory and are lost on exit.
    #[default]
    InMemory,

    /// One key file per alias in the given folder.
    File {
        /// Folder holding the key files. It is created on first use.
        folder_path: PathBuf,
    },

    /// The platform credential store (Keychain, Credential Manager, kernel keyutils).
    #[cfg(feature = "keyring")]
    Keyring {
        /// Service name the keys are filed under.
        service: String,
    },
}

/// Create the key storage backend described by `configuration`.
pub fn create_key_storage(configuration: &KeyStorageConfiguration) -> Arc<dyn SecureKeyStorage> {
    match configuration {
        KeyStorageConfiguration::InMemory => Arc::new(InMemoryKeyStorage::new()),
        KeyStorageConfiguration::File { folder_path } => {
            Arc::new(FileKeyStorage::new(folder_path.clone()))
        }
        #[cfg(feature = "keyring")]
        KeyStorageConfiguration::Keyring { service } => {
            Arc::new(KeyringKeyStorage::new(service.clone()))
        }
    }
}

/// Aliases end up in file names and credential entries, so only a conservative character set is
/// accepted.
pub(crate) fn validate_alias(alias: &str) -> Result<(), KeyStorageError> {
    let valid = !alias.is_empty()
        && alias.len() <= 128
        && alias
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        && !alias.starts_with('.');
    if valid {
        Ok(())
    } else {
        Err(KeyStorageError::InvalidAlias(alias.to_owned()))
    }
}
