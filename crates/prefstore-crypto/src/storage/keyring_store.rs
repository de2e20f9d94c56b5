use tracing::debug;
use zeroize::Zeroizing;

use super::{validate_alias, SecureKeyStorage};
use crate::{KeyStorageError, MasterKey};

/// Stores master keys in the platform credential store through the `keyring` crate.
///
/// Credential store calls are blocking, so they run on the blocking thread pool.
///
/// The platform stores expose no lookup that skips the secret, so [SecureKeyStorage::contains]
/// costs one credential store read. [EncryptionEngine](crate::EncryptionEngine) calls it once
/// per encrypt or decrypt of a cached key, which on some platforms may prompt for access.
#[derive(Debug, Clone)]
pub struct KeyringKeyStorage {
    service: String,
}

impl KeyringKeyStorage {
    /// Create a storage that files keys under `service`.
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, alias: &str) -> Result<keyring::Entry, KeyStorageError> {
        validate_alias(alias)?;
        keyring::Entry::new(&self.service, alias)
            .map_err(|e| KeyStorageError::Backend(format!("keyring entry error: {e}")))
    }
}

async fn read_entry(alias: &str, entry: keyring::Entry) -> Result<Option<MasterKey>, KeyStorageError> {
    let result = tokio::task::spawn_blocking(move || entry.get_password())
        .await
        .map_err(|e| KeyStorageError::Backend(format!("keyring join error: {e}")))?;

    match result {
        Ok(encoded) => {
            let encoded = Zeroizing::new(encoded);
            MasterKey::from_base64(alias, &encoded).map(Some)
        }
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => Err(KeyStorageError::Backend(format!("keyring get error: {e}"))),
    }
}

#[async_trait::async_trait]
impl SecureKeyStorage for KeyringKeyStorage {
    async fn load(&self, alias: &str) -> Result<Option<MasterKey>, KeyStorageError> {
        read_entry(alias, self.entry(alias)?).await
    }

    async fn create(&self, alias: &str) -> Result<MasterKey, KeyStorageError> {
        if let Some(existing) = read_entry(alias, self.entry(alias)?).await? {
            return Ok(existing);
        }

        let key = MasterKey::generate()?;
        let encoded = key.to_base64();
        let entry = self.entry(alias)?;
        tokio::task::spawn_blocking(move || entry.set_password(&encoded))
            .await
            .map_err(|e| KeyStorageError::Backend(format!("keyring join error: {e}")))?
            .map_err(|e| KeyStorageError::Backend(format!("keyring set error: {e}")))?;

        debug!(alias, service = %self.service, "Created master key in keyring");
        Ok(key)
    }

    async fn contains(&self, alias: &str) -> Result<bool, KeyStorageError> {
        let entry = self.entry(alias)?;
        let result = tokio::task::spawn_blocking(move || entry.get_password().map(Zeroizing::new))
            .await
            .map_err(|e| KeyStorageError::Backend(format!("keyring join error: {e}")))?;

        match result {
            Ok(_) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(e) => Err(KeyStorageError::Backend(format!("keyring get error: {e}"))),
        }
    }
}
