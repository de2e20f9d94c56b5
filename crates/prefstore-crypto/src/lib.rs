#![doc = include_str!("../README.md")]

mod aes_gcm;
mod engine;
pub use engine::{EncryptionEngine, KeyState};
mod envelope;
pub use envelope::{EncryptedEnvelope, EnvelopeFormat};
mod error;
pub use error::{CryptoError, DecryptionError, EncryptionError, KeyStorageError};
mod keys;
pub use keys::MasterKey;
mod storage;
#[cfg(feature = "keyring")]
pub use storage::KeyringKeyStorage;
pub use storage::{
    create_key_storage, FileKeyStorage, InMemoryKeyStorage, KeyStorageConfiguration,
    SecureKeyStorage,
};
