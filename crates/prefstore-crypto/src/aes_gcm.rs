//! # AES-256-GCM operations
//!
//! Contains low level AES-256-GCM operations used by the rest of the crate.
//!
//! In most cases you should use the [EncryptionEngine][crate::EncryptionEngine] instead.
//!
//! Note:
//! AES-256-GCM encrypts data, and authenticates both the cipher text and associated
//! data. This does not provide key-commitment, and assumes there can only be one key per alias.

use ::aes_gcm::{
    aead::generic_array::{typenum::Unsigned, GenericArray},
    AeadCore, AeadInPlace, Aes256Gcm, KeyInit,
};
use rand::{rngs::OsRng, CryptoRng, RngCore};

use crate::{DecryptionError, EncryptionError};

pub(crate) const NONCE_SIZE: usize = <Aes256Gcm as AeadCore>::NonceSize::USIZE;
pub(crate) const TAG_SIZE: usize = <Aes256Gcm as AeadCore>::TagSize::USIZE;
pub(crate) const KEY_SIZE: usize = 32;

/// Draw a fresh nonce from the operating system RNG.
///
/// Nonces are 96 bits and random, so two encryptions under the same key collide with negligible
/// probability for the data volumes a preference store handles.
pub(crate) fn generate_nonce() -> Result<[u8; NONCE_SIZE], EncryptionError> {
    generate_nonce_internal(OsRng)
}

fn generate_nonce_internal(
    mut rng: impl RngCore + CryptoRng,
) -> Result<[u8; NONCE_SIZE], EncryptionError> {
    let mut nonce = [0u8; NONCE_SIZE];
    rng.try_fill_bytes(&mut nonce)
        .map_err(|_| EncryptionError::NonceGenerationFailure)?;
    Ok(nonce)
}

pub(crate) fn encrypt_aes256_gcm(
    nonce: &[u8; NONCE_SIZE],
    key: &[u8; KEY_SIZE],
    plaintext_secret_data: &[u8],
    associated_data: &[u8],
) -> Result<Vec<u8>, EncryptionError> {
    // This buffer contains the plaintext, that will be encrypted in-place
    let mut buffer = plaintext_secret_data.to_vec();
    Aes256Gcm::new(GenericArray::from_slice(key))
        .encrypt_in_place(
            GenericArray::from_slice(nonce),
            associated_data,
            &mut buffer,
        )
        .map_err(|_| EncryptionError::PayloadTooLarge)?;
    Ok(buffer)
}

pub(crate) fn decrypt_aes256_gcm(
    nonce: &[u8; NONCE_SIZE],
    key: &[u8; KEY_SIZE],
    ciphertext: &[u8],
    associated_data: &[u8],
) -> Result<Vec<u8>, DecryptionError> {
    let mut buffer = ciphertext.to_vec();
    Aes256Gcm::new(GenericArray::from_slice(key))
        .decrypt_in_place(
            GenericArray::from_slice(nonce),
            associated_data,
            &mut buffer,
        )
        .map_err(|_| DecryptionError::AuthenticationFailure)?;
    Ok(buffer)
}
