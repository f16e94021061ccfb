use std::fmt;

use zeroize::Zeroizing;

use super::{KEY_LEN, secure_random};
use crate::error::{Result, SealError};

/// Ephemeral 256-bit key material.
///
/// Zeroed on drop. Deliberately not `Clone` or `Serialize`, and its `Debug`
/// output is redacted.
pub struct SecretMaterial {
    bytes: Zeroizing<[u8; KEY_LEN]>,
}

impl SecretMaterial {
    /// Wraps a provisioned key.
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self {
            bytes: Zeroizing::new(bytes),
        }
    }

    /// Copies a provisioned key out of a slice, which must be exactly [`KEY_LEN`] bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        if bytes.len() != KEY_LEN {
            return Err(SealError::invalid(format!(
                "key must be {KEY_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        key.copy_from_slice(bytes);
        Ok(Self { bytes: key })
    }

    /// Generates a random key, for provisioning.
    pub fn generate() -> Result<Self> {
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        secure_random(key.as_mut_slice())?;
        Ok(Self { bytes: key })
    }

    pub(crate) fn from_zeroizing(bytes: Zeroizing<[u8; KEY_LEN]>) -> Self {
        Self { bytes }
    }

    pub(crate) fn expose(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl fmt::Debug for SecretMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretMaterial")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}
