use thiserror::Error;

/// Failures reported by a [SecureKeyStorage][crate::SecureKeyStorage] backend.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum KeyStorageError {
    #[error("Invalid key alias {0:?}")]
    InvalidAlias(String),

    #[error("Stored key material for alias {0:?} is invalid")]
    InvalidKeyMaterial(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Key storage backend error: {0}")]
    Backend(String),
}

/// Errors raised while sealing a value.
#[derive(Debug, Error)]
pub enum EncryptionError {
    /// The alias has no master key and the operation is not allowed to create one.
    #[error("No master key is available for alias {0:?}")]
    KeyUnavailable(String),

    /// The operating system RNG could not supply a nonce.
    #[error("Failed to generate a nonce")]
    NonceGenerationFailure,

    /// The plaintext exceeds the AES-GCM message size limit.
    #[error("Payload is too large to encrypt")]
    PayloadTooLarge,

    /// The key storage backend failed.
    #[error(transparent)]
    KeyStorage(#[from] KeyStorageError),
}

/// Errors raised while opening an envelope.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecryptionError {
    /// The tag did not verify: the envelope was altered or sealed under another key.
    #[error("Envelope failed authentication")]
    AuthenticationFailure,

    /// The envelope could not be parsed, or its plaintext is not valid UTF-8.
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),
}

#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error(transparent)]
    Encryption(#[from] EncryptionError),

    #[error(transparent)]
    Decryption(#[from] DecryptionError),
}

impl From<KeyStorageError> for CryptoError {
    fn from(value: KeyStorageError) -> Self {
        CryptoError::Encryption(value.into())
    }
}
