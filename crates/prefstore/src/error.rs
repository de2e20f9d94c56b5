use prefstore_crypto::{CryptoError, DecryptionError, EncryptionError};
use prefstore_state::DatabaseError;
use thiserror::Error;

use crate::{EntryKind, ScalarType};

/// A key was used with a type other than the one it is declared or stored with.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Preference '{key}' holds {declared} but was accessed as {requested}")]
pub struct ValidationError {
    key: String,
    declared: EntryKind,
    requested: EntryKind,
}

impl ValidationError {
    pub(crate) fn new(key: impl Into<String>, declared: EntryKind, requested: EntryKind) -> Self {
        Self {
            key: key.into(),
            declared,
            requested,
        }
    }

    /// Name of the offending key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The kind the key is bound to or stored as.
    pub fn declared(&self) -> EntryKind {
        self.declared
    }

    /// The kind the caller asked for.
    pub fn requested(&self) -> EntryKind {
        self.requested
    }
}

/// Text could not be converted to or from a scalar value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SerializationError {
    /// NaN and infinities cannot be stored
    #[error("Non-finite {0} values cannot be stored")]
    NonFinite(ScalarType),

    /// The text is not the canonical encoding of a value of the type
    #[error("Invalid {scalar_type} payload: {text:?}")]
    NonCanonical {
        #[allow(missing_docs)]
        scalar_type: ScalarType,
        #[allow(missing_docs)]
        text: String,
    },

    /// The persisted tag names no known type
    #[error("Unknown entry tag: {0:?}")]
    UnknownTag(String),
}

/// Errors returned by the preference store.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum PreferenceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Serialization(#[from] SerializationError),

    #[error(transparent)]
    Encryption(#[from] EncryptionError),

    #[error(transparent)]
    Decryption(#[from] DecryptionError),

    #[error(transparent)]
    Storage(#[from] DatabaseError),

    #[error("Invalid namespace name: {0:?}")]
    InvalidNamespace(String),

    #[error("Background write failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl From<CryptoError> for PreferenceError {
    fn from(error: CryptoError) -> Self {
        match error {
            CryptoError::Encryption(e) => PreferenceError::Encryption(e),
            CryptoError::Decryption(e) => PreferenceError::Decryption(e),
        }
    }
}
