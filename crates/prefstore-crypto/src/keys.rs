use base64::{engine::general_purpose::STANDARD, Engine};
use rand::{rngs::OsRng, RngCore};
use subtle::{Choice, ConstantTimeEq};
use zeroize::{Zeroize, Zeroizing};

use crate::{aes_gcm::KEY_SIZE, KeyStorageError};

/// A 256-bit master key used to seal and open envelopes.
///
/// The key material is kept on the heap, wiped when the key is dropped, and is never exposed
/// outside of this crate. Storage backends persist it through the crate-private encoding helpers.
#[derive(Clone)]
pub struct MasterKey {
    material: Box<[u8; KEY_SIZE]>,
}

impl MasterKey {
    /// Generate a new random master key from the operating system RNG.
    pub fn generate() -> Result<Self, KeyStorageError> {
        let mut material = Box::new([0u8; KEY_SIZE]);
        OsRng
            .try_fill_bytes(&mut material[..])
            .map_err(|e| KeyStorageError::Backend(format!("key generation failed: {e}")))?;
        Ok(Self { material })
    }

    pub(crate) fn material(&self) -> &[u8; KEY_SIZE] {
        &self.material
    }

    pub(crate) fn to_base64(&self) -> Zeroizing<String> {
        Zeroizing::new(STANDARD.encode(&self.material[..]))
    }

    pub(crate) fn from_base64(alias: &str, encoded: &str) -> Result<Self, KeyStorageError> {
        let decoded = Zeroizing::new(
            STANDARD
                .decode(encoded.trim())
                .map_err(|_| KeyStorageError::InvalidKeyMaterial(alias.to_owned()))?,
        );
        if decoded.len() != KEY_SIZE {
            return Err(KeyStorageError::InvalidKeyMaterial(alias.to_owned()));
        }

        let mut material = Box::new([0u8; KEY_SIZE]);
        material.copy_from_slice(&decoded);
        Ok(Self { material })
    }
}

impl Drop for MasterKey {
    fn drop(&mut self) {
        self.material.zeroize();
    }
}

impl ConstantTimeEq for MasterKey {
    fn ct_eq(&self, other: &Self) -> Choice {
        self.material[..].ct_eq(&other.material[..])
    }
}

impl PartialEq for MasterKey {
    fn eq(&self, other: &Self) -> bool {
        self.ct_eq(other).into()
    }
}

impl Eq for MasterKey {}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKey").finish()
    }
}
