//! One-way hashing of PINs and passwords.
//!
//! Hashes are Argon2id PHC strings, so the salt and cost parameters travel
//! with the hash and `verify` needs nothing else.

use std::fmt;

use argon2::{
    Algorithm, Argon2, Params,
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};

use super::{DerivationParams, ResourceLimits, Salt};
use crate::error::{Result, SealError};

/// A stored Argon2id hash in PHC string format.
///
/// There is intentionally no `PartialEq`: compare through [`verify`].
#[derive(Debug, Clone)]
pub struct SecretHash(String);

impl SecretHash {
    /// Parses a stored hash, rejecting anything that is not an Argon2id PHC string.
    pub fn parse(s: &str) -> Result<Self> {
        let parsed = parse_phc(s)?;
        Params::try_from(&parsed).map_err(|e| SealError::invalid(format!("stored hash: {e}")))?;
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SecretHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn parse_phc(s: &str) -> Result<PasswordHash<'_>> {
    let parsed =
        PasswordHash::new(s).map_err(|e| SealError::invalid(format!("stored hash: {e}")))?;
    if parsed.algorithm != Algorithm::Argon2id.ident() {
        return Err(SealError::invalid(format!(
            "stored hash uses unsupported algorithm {}",
            parsed.algorithm
        )));
    }
    if parsed.salt.is_none() || parsed.hash.is_none() {
        return Err(SealError::invalid("stored hash is missing salt or output"));
    }
    Ok(parsed)
}

/// Hashes `secret` with a fresh salt.
pub fn hash(secret: &[u8], params: &DerivationParams) -> Result<SecretHash> {
    if secret.is_empty() {
        return Err(SealError::invalid("secret must not be empty"));
    }
    let argon2 = params.argon2()?;
    let salt = Salt::generate(params.salt_len())?;
    let salt = SaltString::encode_b64(salt.as_bytes())
        .map_err(|e| SealError::invalid(format!("salt encoding: {e}")))?;

    let phc = argon2
        .hash_password(secret, &salt)
        .map_err(|e| SealError::invalid(format!("hashing failed: {e}")))?
        .to_string();

    Ok(SecretHash(phc))
}

/// Checks `candidate` against `hash` under the default [`ResourceLimits`].
pub fn verify(hash: &SecretHash, candidate: &[u8]) -> Result<bool> {
    verify_within(hash, candidate, &ResourceLimits::default())
}

/// Checks `candidate` against `hash`.
///
/// A mismatch is `Ok(false)`, never an error. The final comparison is
/// constant-time.
///
/// # Errors
///
/// - [`SealError::InvalidInput`] if the stored hash is malformed.
/// - [`SealError::ResourceExhausted`] if any of its costs is above `limits`.
pub fn verify_within(hash: &SecretHash, candidate: &[u8], limits: &ResourceLimits) -> Result<bool> {
    let parsed = parse_phc(hash.as_str())?;
    let params =
        Params::try_from(&parsed).map_err(|e| SealError::invalid(format!("stored hash: {e}")))?;
    limits.check_costs(params.m_cost(), params.t_cost(), params.p_cost())?;

    match Argon2::default().verify_password(candidate, &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => Err(SealError::invalid(format!("verification failed: {e}"))),
    }
}

/// Returns `true` if `hash` was produced with parameters other than `params`.
pub fn needs_rehash(hash: &SecretHash, params: &DerivationParams) -> Result<bool> {
    let parsed = parse_phc(hash.as_str())?;
    let stored =
        Params::try_from(&parsed).map_err(|e| SealError::invalid(format!("stored hash: {e}")))?;

    Ok(stored.m_cost() != params.mem_cost_kib()
        || stored.t_cost() != params.time_cost()
        || stored.p_cost() != params.parallelism())
}
