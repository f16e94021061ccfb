//! Envelope format for encrypted fields.
//!
//! An [`EncryptedField`] is serialized to a versioned binary layout and then
//! to unpadded base64url so it can sit in a form field or JSON string.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};

use crate::crypto::{AeadAlgorithm, DerivationParams, Nonce, Salt, Sealed, TAG_LEN};
use crate::error::{Result, SealError};

pub mod v1;

/// Magic bytes identifying a sealed field ("SFLD").
pub const MAGIC: &[u8; 4] = b"SFLD";
/// Length of magic bytes.
pub const MAGIC_LEN: usize = 4;
/// Length of version field.
pub const VER_LEN: usize = 1;
/// Latest format version
pub const CURRENT_VERSION: u8 = v1::VERSION_V1;

/// Parameters and salt for a key derived per field from a passphrase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedKey {
    params: DerivationParams,
    salt: Salt,
}

impl DerivedKey {
    pub fn new(params: DerivationParams, salt: Salt) -> Result<Self> {
        params.validate()?;
        if salt.len() != params.salt_len() {
            return Err(SealError::invalid(format!(
                "salt must be {} bytes, got {}",
                params.salt_len(),
                salt.len()
            )));
        }
        Ok(Self { params, salt })
    }

    pub fn params(&self) -> &DerivationParams {
        &self.params
    }

    pub fn salt(&self) -> &Salt {
        &self.salt
    }
}

/// How the decryptor obtains the key for an envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyBinding {
    /// Re-derive from the shared passphrase with these params and salt.
    Derived(DerivedKey),
    /// Look up a provisioned key by id.
    Provisioned { key_id: u32 },
}

/// Wire representation of one sensitive value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedField {
    version: u8,
    algorithm: AeadAlgorithm,
    key: KeyBinding,
    nonce: Nonce,
    ciphertext: Vec<u8>,
}

impl EncryptedField {
    /// Builds an envelope around freshly sealed data.
    pub fn new(algorithm: AeadAlgorithm, key: KeyBinding, sealed: Sealed) -> Self {
        let (nonce, ciphertext) = sealed.into_parts();
        Self {
            version: CURRENT_VERSION,
            algorithm,
            key,
            nonce,
            ciphertext,
        }
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn algorithm(&self) -> AeadAlgorithm {
        self.algorithm
    }

    pub fn key(&self) -> &KeyBinding {
        &self.key
    }

    pub fn nonce(&self) -> &Nonce {
        &self.nonce
    }

    /// Returns `ciphertext || tag`.
    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    /// Returns the authentication tag alone.
    pub fn tag(&self) -> &[u8] {
        &self.ciphertext[self.ciphertext.len().saturating_sub(TAG_LEN)..]
    }

    /// Associated data authenticated with the ciphertext: the envelope header
    /// followed by the name of the field the value belongs to.
    pub fn associated_data(&self, field: &str) -> Vec<u8> {
        associated_data(self.algorithm, &self.key, field)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        v1::serialize(self)
    }

    /// Parses the binary form, dispatching on the version byte.
    ///
    /// # Errors
    ///
    /// - [`SealError::UnsupportedVersion`] for an unknown version or algorithm id.
    /// - [`SealError::InvalidInput`] for anything else malformed.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < MAGIC_LEN + VER_LEN {
            return Err(SealError::invalid("envelope too short"));
        }

        if &data[..MAGIC_LEN] != MAGIC {
            return Err(SealError::invalid("invalid envelope magic"));
        }

        match data[MAGIC_LEN] {
            v1::VERSION_V1 => v1::parse(data),
            other => Err(SealError::UnsupportedVersion {
                what: "envelope version",
                id: other,
            }),
        }
    }

    /// Encodes the envelope as text. Deterministic for a given envelope.
    pub fn encode(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.to_bytes())
    }

    /// Decodes envelope text exactly as [`encode`](Self::encode) produces it.
    /// Padding and surrounding whitespace are rejected.
    pub fn decode(text: &str) -> Result<Self> {
        let data = URL_SAFE_NO_PAD
            .decode(text)
            .map_err(|_| SealError::invalid("envelope is not valid base64url"))?;
        Self::from_bytes(&data)
    }
}

/// Associated data for a value about to be sealed under `key` for `field`.
pub fn associated_data(algorithm: AeadAlgorithm, key: &KeyBinding, field: &str) -> Vec<u8> {
    let mut aad = v1::header(algorithm, key);
    aad.extend_from_slice(field.as_bytes());
    aad
}
