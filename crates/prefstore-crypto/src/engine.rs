use std::{
    collections::HashMap,
    sync::{Arc, Mutex, RwLock},
};

use tracing::{debug, info, warn};

use crate::{
    CryptoError, DecryptionError, EncryptedEnvelope, EncryptionError, MasterKey,
    SecureKeyStorage,
};

/// Lifecycle of the master key behind one alias, as seen by an [EncryptionEngine].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    /// No key has been fetched or generated yet, or the backing storage was cleared.
    Absent,
    /// A caller is fetching or generating the key.
    Generating,
    /// The key is cached and ready for use.
    Present,
}

enum Slot {
    Absent,
    Generating,
    Present(MasterKey),
}

impl Slot {
    fn state(&self) -> KeyState {
        match self {
            Slot::Absent => KeyState::Absent,
            Slot::Generating => KeyState::Generating,
            Slot::Present(_) => KeyState::Present,
        }
    }
}

struct KeySlot {
    slot: RwLock<Slot>,
    // Serializes the Absent -> Present transition. Held across storage calls.
    transition: tokio::sync::Mutex<()>,
}

impl KeySlot {
    fn new() -> Self {
        Self {
            slot: RwLock::new(Slot::Absent),
            transition: tokio::sync::Mutex::new(()),
        }
    }

    fn present_key(&self) -> Option<MasterKey> {
        match &*self.slot.read().expect("RwLock should not be poisoned") {
            Slot::Present(key) => Some(key.clone()),
            _ => None,
        }
    }

    fn set(&self, slot: Slot) {
        *self.slot.write().expect("RwLock should not be poisoned") = slot;
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum KeyAccess {
    /// Fetch the key, generating it when the storage has none.
    FetchOrCreate,
    /// Fetch the key, failing when the storage has none.
    Fetch,
}

/// Authenticated encryption of string payloads under master keys addressed by alias.
///
/// The engine is an explicitly owned capability: construct it once with the key storage backend
/// and share it through an [Arc] with every store that needs encryption. Master keys are fetched
/// or generated lazily and cached per alias. When several tasks need an alias that is not cached
/// yet, exactly one of them talks to the storage and the others wait for its result.
///
/// ```rust
/// # use std::sync::Arc;
/// # use prefstore_crypto::*;
/// # async fn example() -> Result<(), CryptoError> {
/// let engine = EncryptionEngine::new(Arc::new(InMemoryKeyStorage::new()));
/// assert_eq!(engine.key_state("alias"), KeyState::Absent);
///
/// let envelope = engine.encrypt("alias", "abc123").await?;
/// assert_eq!(engine.key_state("alias"), KeyState::Present);
/// assert_eq!(engine.decrypt("alias", &envelope).await?, "abc123");
/// # Ok(())
/// # }
/// ```
pub struct EncryptionEngine {
    storage: Arc<dyn SecureKeyStorage>,
    slots: Mutex<HashMap<String, Arc<KeySlot>>>,
}

impl std::fmt::Debug for EncryptionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionEngine").finish()
    }
}

impl EncryptionEngine {
    /// Create an engine backed by `storage`.
    pub fn new(storage: Arc<dyn SecureKeyStorage>) -> Self {
        Self {
            storage,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Seal `plaintext` under the master key for `alias`, generating the key on first use.
    ///
    /// Every call draws a fresh random nonce.
    pub async fn encrypt(
        &self,
        alias: &str,
        plaintext: &str,
    ) -> Result<EncryptedEnvelope, EncryptionError> {
        let key = self.key(alias, KeyAccess::FetchOrCreate).await?;
        EncryptedEnvelope::seal(&key, plaintext.as_bytes())
    }

    /// Open `envelope` with the master key for `alias`.
    ///
    /// Never generates a key: if the storage has none for `alias` this fails with
    /// [EncryptionError::KeyUnavailable]. A tag mismatch fails with
    /// [DecryptionError::AuthenticationFailure] and no plaintext is returned.
    pub async fn decrypt(
        &self,
        alias: &str,
        envelope: &EncryptedEnvelope,
    ) -> Result<String, CryptoError> {
        let key = self.key(alias, KeyAccess::Fetch).await?;
        let plaintext = envelope.open(&key)?;
        String::from_utf8(plaintext.to_vec()).map_err(|_| {
            DecryptionError::MalformedEnvelope("plaintext is not valid UTF-8".to_owned()).into()
        })
    }

    /// The current lifecycle state of `alias` in this engine.
    pub fn key_state(&self, alias: &str) -> KeyState {
        self.slots
            .lock()
            .expect("Mutex should not be poisoned")
            .get(alias)
            .map(|slot| slot.slot.read().expect("RwLock should not be poisoned").state())
            .unwrap_or(KeyState::Absent)
    }

    /// Drop the cached key for `alias`. The next operation fetches it from storage again.
    pub fn forget(&self, alias: &str) {
        if let Some(slot) = self
            .slots
            .lock()
            .expect("Mutex should not be poisoned")
            .get(alias)
        {
            slot.set(Slot::Absent);
        }
    }

    fn slot(&self, alias: &str) -> Arc<KeySlot> {
        self.slots
            .lock()
            .expect("Mutex should not be poisoned")
            .entry(alias.to_owned())
            .or_insert_with(|| Arc::new(KeySlot::new()))
            .clone()
    }

    async fn key(&self, alias: &str, access: KeyAccess) -> Result<MasterKey, EncryptionError> {
        let slot = self.slot(alias);

        if let Some(key) = slot.present_key() {
            if self.storage.contains(alias).await? {
                return Ok(key);
            }
            warn!(alias, "Master key disappeared from key storage, resetting");
            slot.set(Slot::Absent);
        }

        let _transition = slot.transition.lock().await;

        // Another caller may have completed the transition while we were waiting.
        if let Some(key) = slot.present_key() {
            return Ok(key);
        }

        // A Generating slot at this point was left behind by a cancelled caller and is resumed.
        slot.set(Slot::Generating);

        let result = match access {
            KeyAccess::FetchOrCreate => match self.storage.load(alias).await {
                Ok(Some(key)) => Ok(Some(key)),
                Ok(None) => {
                    info!(alias, "Generating master key");
                    self.storage.create(alias).await.map(Some)
                }
                Err(e) => Err(e),
            },
            KeyAccess::Fetch => self.storage.load(alias).await,
        };

        match result {
            Ok(Some(key)) => {
                debug!(alias, "Master key ready");
                slot.set(Slot::Present(key.clone()));
                Ok(key)
            }
            Ok(None) => {
                slot.set(Slot::Absent);
                Err(EncryptionError::KeyUnavailable(alias.to_owned()))
            }
            Err(e) => {
                slot.set(Slot::Absent);
                Err(e.into())
            }
        }
    }
}
