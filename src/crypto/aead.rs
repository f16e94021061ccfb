use super::{NONCE_LEN, SecretMaterial, TAG_LEN, secure_random};
use crate::error::{Result, SealError};
use chacha20poly1305::{
    Key, XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit, Payload},
};
use zeroize::Zeroizing;

/// AEAD algorithms the envelope can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AeadAlgorithm {
    #[default]
    XChaCha20Poly1305,
}

impl AeadAlgorithm {
    pub fn id(self) -> u8 {
        match self {
            AeadAlgorithm::XChaCha20Poly1305 => 1,
        }
    }

    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(AeadAlgorithm::XChaCha20Poly1305),
            _ => None,
        }
    }
}

/// A 192-bit XChaCha20 nonce.
///
/// Encryption only ever uses nonces it generated itself; the public
/// constructor exists so decoders can rebuild a received nonce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Nonce([u8; NONCE_LEN]);

impl Nonce {
    fn generate() -> Result<Self> {
        let mut nonce = [0u8; NONCE_LEN];
        secure_random(&mut nonce)?;
        Ok(Self(nonce))
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let nonce: [u8; NONCE_LEN] = bytes.try_into().map_err(|_| {
            SealError::invalid(format!(
                "nonce must be {NONCE_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(nonce))
    }

    pub fn as_bytes(&self) -> &[u8; NONCE_LEN] {
        &self.0
    }
}

/// Output of one encryption: the fresh nonce and `ciphertext || tag`.
#[derive(Debug, Clone)]
pub struct Sealed {
    nonce: Nonce,
    ciphertext: Vec<u8>,
}

impl Sealed {
    pub fn nonce(&self) -> &Nonce {
        &self.nonce
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    pub fn into_parts(self) -> (Nonce, Vec<u8>) {
        (self.nonce, self.ciphertext)
    }
}

/// Encrypt plaintext under a fresh random nonce, authenticating `aad` alongside it.
pub fn encrypt(plaintext: &[u8], key: &SecretMaterial, aad: &[u8]) -> Result<Sealed> {
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key.expose()));
    let nonce = Nonce::generate()?;

    let ciphertext = cipher
        .encrypt(
            XNonce::from_slice(nonce.as_bytes()),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|_| SealError::invalid("encryption failed"))?;

    Ok(Sealed { nonce, ciphertext })
}

/// Decrypt `ciphertext || tag`.
///
/// The tag is checked before any plaintext is released; on mismatch the
/// result is [`SealError::AuthenticationFailed`] and nothing else.
pub fn decrypt(
    nonce: &Nonce,
    ciphertext: &[u8],
    key: &SecretMaterial,
    aad: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    if ciphertext.len() < TAG_LEN {
        return Err(SealError::invalid("ciphertext shorter than tag"));
    }
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key.expose()));

    let plaintext = cipher
        .decrypt(
            XNonce::from_slice(nonce.as_bytes()),
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|_| SealError::AuthenticationFailed)?;
    Ok(Zeroizing::new(plaintext))
}
