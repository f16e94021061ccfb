//! Envelope format v1.
//!
//! V1 Envelope Format:
//! ```text
//! MAGIC (4) | VERSION (1) | AEAD_ALG (1) | KEY_MODE (1) | KEY SECTION | NONCE (24) | CIPHERTEXT || TAG (>= 16)
//!
//! KEY_MODE 1, derived:     KDF_ALG (1) | MEM_COST (4) | TIME_COST (4) | PARALLELISM (4) | SALT_LEN (1) | SALT
//! KEY_MODE 2, provisioned: KEY_ID (4)
//! ```
//!
//! Everything before the nonce is the header, which doubles as associated data.

use super::{DerivedKey, EncryptedField, KeyBinding, MAGIC, MAGIC_LEN, VER_LEN};
use crate::crypto::{
    AeadAlgorithm, DerivationParams, KdfAlgorithm, NONCE_LEN, Nonce, Salt, TAG_LEN,
};
use crate::error::{Result, SealError};

/// Current envelope format version.
pub const VERSION_V1: u8 = 1;

const MODE_DERIVED: u8 = 1;
const MODE_PROVISIONED: u8 = 2;

const MEM_LEN: usize = 4;
const TIME_LEN: usize = 4;
const PAR_LEN: usize = 4;
const KEY_ID_LEN: usize = 4;

/// Serializes the header for `key` under `algorithm`.
pub fn header(algorithm: AeadAlgorithm, key: &KeyBinding) -> Vec<u8> {
    let mut buf = Vec::with_capacity(64);

    buf.extend_from_slice(MAGIC);
    buf.push(VERSION_V1);
    buf.push(algorithm.id());

    match key {
        KeyBinding::Derived(derived) => {
            let params = derived.params();
            buf.push(MODE_DERIVED);
            buf.push(params.algorithm().id());
            buf.extend_from_slice(&params.mem_cost_kib().to_le_bytes());
            buf.extend_from_slice(&params.time_cost().to_le_bytes());
            buf.extend_from_slice(&params.parallelism().to_le_bytes());
            // DerivedKey guarantees the salt fits the length byte.
            buf.push(derived.salt().len() as u8);
            buf.extend_from_slice(derived.salt().as_bytes());
        }
        KeyBinding::Provisioned { key_id } => {
            buf.push(MODE_PROVISIONED);
            buf.extend_from_slice(&key_id.to_le_bytes());
        }
    }

    buf
}

/// Serializes an envelope to v1 bytes.
pub fn serialize(field: &EncryptedField) -> Vec<u8> {
    let mut buf = header(field.algorithm(), field.key());
    buf.extend_from_slice(field.nonce().as_bytes());
    buf.extend_from_slice(field.ciphertext());
    buf
}

fn take<'a>(data: &'a [u8], offset: &mut usize, len: usize) -> Result<&'a [u8]> {
    let end = offset
        .checked_add(len)
        .filter(|end| *end <= data.len())
        .ok_or_else(|| SealError::invalid("envelope truncated"))?;
    let slice = &data[*offset..end];
    *offset = end;
    Ok(slice)
}

fn take_u8(data: &[u8], offset: &mut usize) -> Result<u8> {
    Ok(take(data, offset, 1)?[0])
}

fn take_u32(data: &[u8], offset: &mut usize, len: usize) -> Result<u32> {
    let bytes: [u8; 4] = take(data, offset, len)?
        .try_into()
        .map_err(|_| SealError::invalid("envelope truncated"))?;
    Ok(u32::from_le_bytes(bytes))
}

/// Parses a v1 envelope. Magic and version have already been checked.
///
/// # Errors
///
/// Returns [`SealError::UnsupportedVersion`] for unknown algorithm ids and
/// [`SealError::InvalidInput`] for truncation or invalid parameters.
pub fn parse(data: &[u8]) -> Result<EncryptedField> {
    let mut offset = MAGIC_LEN + VER_LEN;

    let alg_id = take_u8(data, &mut offset)?;
    let algorithm = AeadAlgorithm::from_id(alg_id).ok_or(SealError::UnsupportedVersion {
        what: "aead algorithm",
        id: alg_id,
    })?;

    let key = match take_u8(data, &mut offset)? {
        MODE_DERIVED => {
            let kdf_id = take_u8(data, &mut offset)?;
            let kdf = KdfAlgorithm::from_id(kdf_id).ok_or(SealError::UnsupportedVersion {
                what: "kdf algorithm",
                id: kdf_id,
            })?;

            let mem_cost = take_u32(data, &mut offset, MEM_LEN)?;
            let time_cost = take_u32(data, &mut offset, TIME_LEN)?;
            let parallelism = take_u32(data, &mut offset, PAR_LEN)?;
            let salt_len = take_u8(data, &mut offset)? as usize;
            let salt = Salt::from_slice(take(data, &mut offset, salt_len)?);

            let params = match kdf {
                KdfAlgorithm::Argon2id => DerivationParams::new(mem_cost, time_cost, parallelism)?
                    .with_salt_len(salt_len)?,
            };
            KeyBinding::Derived(DerivedKey::new(params, salt)?)
        }
        MODE_PROVISIONED => KeyBinding::Provisioned {
            key_id: take_u32(data, &mut offset, KEY_ID_LEN)?,
        },
        other => return Err(SealError::invalid(format!("unknown key mode {other}"))),
    };

    let nonce = Nonce::from_slice(take(data, &mut offset, NONCE_LEN)?)?;

    let ciphertext = data[offset..].to_vec();
    if ciphertext.len() < TAG_LEN {
        return Err(SealError::invalid("ciphertext shorter than tag"));
    }

    Ok(EncryptedField {
        version: VERSION_V1,
        algorithm,
        key,
        nonce,
        ciphertext,
    })
}
