use std::{fmt, str::FromStr};

use base64::{engine::general_purpose::STANDARD, Engine};
use zeroize::Zeroizing;

use crate::{
    aes_gcm::{decrypt_aes256_gcm, encrypt_aes256_gcm, generate_nonce, NONCE_SIZE, TAG_SIZE},
    DecryptionError, EncryptionError, MasterKey,
};

/// The algorithm and byte layout of an [EncryptedEnvelope].
///
/// The numeric id is the first component of the serialized form, so new formats can be added
/// without breaking envelopes that are already persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvelopeFormat {
    /// AES-256-GCM with a 96-bit random nonce and a 128-bit tag.
    Aes256Gcm,
}

impl EnvelopeFormat {
    /// Numeric id written in the envelope header.
    pub const fn id(self) -> u8 {
        match self {
            EnvelopeFormat::Aes256Gcm => 1,
        }
    }

    /// Length in bytes of the nonce that prefixes the envelope payload.
    pub const fn nonce_len(self) -> usize {
        match self {
            EnvelopeFormat::Aes256Gcm => NONCE_SIZE,
        }
    }

    fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(EnvelopeFormat::Aes256Gcm),
            _ => None,
        }
    }

    /// The header is authenticated as associated data.
    fn header(self) -> String {
        format!("{}.{}", self.id(), self.nonce_len())
    }
}

/// A sealed value: nonce, ciphertext and authentication tag.
///
/// Serializes to `<format>.<nonce length>|<base64(nonce || ciphertext || tag)>` through
/// [Display][fmt::Display] and parses back through [FromStr].
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptedEnvelope {
    format: EnvelopeFormat,
    nonce: [u8; NONCE_SIZE],
    /// Ciphertext with the tag appended
    ciphertext: Vec<u8>,
}

impl EncryptedEnvelope {
    pub(crate) fn seal(key: &MasterKey, plaintext: &[u8]) -> Result<Self, EncryptionError> {
        let format = EnvelopeFormat::Aes256Gcm;
        let nonce = generate_nonce()?;
        let ciphertext = encrypt_aes256_gcm(
            &nonce,
            key.material(),
            plaintext,
            format.header().as_bytes(),
        )?;

        Ok(Self {
            format,
            nonce,
            ciphertext,
        })
    }

    pub(crate) fn open(&self, key: &MasterKey) -> Result<Zeroizing<Vec<u8>>, DecryptionError> {
        match self.format {
            EnvelopeFormat::Aes256Gcm => decrypt_aes256_gcm(
                &self.nonce,
                key.material(),
                &self.ciphertext,
                self.format.header().as_bytes(),
            )
            .map(Zeroizing::new),
        }
    }

    /// The format this envelope was sealed with.
    pub fn format(&self) -> EnvelopeFormat {
        self.format
    }

    /// The nonce used for this envelope.
    pub fn nonce(&self) -> &[u8] {
        &self.nonce
    }

    /// The ciphertext, including the trailing authentication tag.
    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    /// The raw envelope bytes, `nonce || ciphertext || tag`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.nonce.len() + self.ciphertext.len());
        bytes.extend_from_slice(&self.nonce);
        bytes.extend_from_slice(&self.ciphertext);
        bytes
    }

    /// Rebuild an envelope from its raw bytes. The bytes are not authenticated until the envelope
    /// is decrypted.
    pub fn from_bytes(format: EnvelopeFormat, bytes: &[u8]) -> Result<Self, DecryptionError> {
        if bytes.len() < format.nonce_len() + TAG_SIZE {
            return Err(DecryptionError::MalformedEnvelope(
                "envelope is truncated".to_owned(),
            ));
        }

        let (nonce_bytes, ciphertext) = bytes.split_at(format.nonce_len());
        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(nonce_bytes);

        Ok(Self {
            format,
            nonce,
            ciphertext: ciphertext.to_vec(),
        })
    }
}

impl fmt::Display for EncryptedEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}",
            self.format.header(),
            STANDARD.encode(self.to_bytes())
        )
    }
}

impl FromStr for EncryptedEnvelope {
    type Err = DecryptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = |reason: &str| DecryptionError::MalformedEnvelope(reason.to_owned());

        let (header, body) = s.split_once('|').ok_or_else(|| malformed("missing header"))?;
        let (id, _) = header
            .split_once('.')
            .ok_or_else(|| malformed("missing nonce length"))?;
        let format = id
            .parse::<u8>()
            .ok()
            .and_then(EnvelopeFormat::from_id)
            .ok_or_else(|| malformed("unsupported format"))?;

        // The nonce length is fixed per format, anything else is a foreign or damaged header.
        if header != format.header() {
            return Err(malformed("unexpected header"));
        }

        let bytes = STANDARD.decode(body).map_err(|_| malformed("invalid base64"))?;
        Self::from_bytes(format, &bytes)
    }
}

impl fmt::Debug for EncryptedEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedEnvelope")
            .field("format", &self.format)
            .field("ciphertext_len", &self.ciphertext.len())
            .finish()
    }
}
