//! Cryptographic primitives for sensitive fields.
//!
//! Provides key derivation, authenticated encryption and one-way secret hashing.

pub mod aead;
pub mod kdf;
pub mod key;
pub mod verifier;

pub use aead::{AeadAlgorithm, Nonce, Sealed, decrypt, encrypt};
pub use kdf::{DerivationParams, KdfAlgorithm, ResourceLimits, Salt, derive, derive_within};
pub use key::SecretMaterial;
pub use verifier::{SecretHash, hash, needs_rehash, verify, verify_within};

use crate::error::{Result, SealError};

/// Length of the default salt (16 bytes).
pub const SALT_LEN: usize = 16;
/// Shortest salt accepted by Argon2.
pub const MIN_SALT_LEN: usize = 8;
/// Longest salt the envelope can describe.
pub const MAX_SALT_LEN: usize = 64;
/// Length of the nonce (24 bytes for XChaCha20-Poly1305).
pub const NONCE_LEN: usize = 24;
/// Length of the Poly1305 authentication tag.
pub const TAG_LEN: usize = 16;
/// Length of the encryption key (32 bytes / 256 bits).
pub const KEY_LEN: usize = 32;

/// Fill buffer with cryptographically secure random bytes
pub(crate) fn secure_random(buf: &mut [u8]) -> Result<()> {
    getrandom::fill(buf)
        .map_err(|_| SealError::ResourceExhausted("OS random generator unavailable".into()))
}
