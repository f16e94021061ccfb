//! Encryption boundary for sensitive storefront form fields.
//!
//! Payment numbers, identity numbers and PINs are sealed field by field with
//! a key derived by Argon2id and XChaCha20-Poly1305, and carried as a
//! self-describing text envelope. PINs and passwords that only ever need to
//! be confirmed are stored as Argon2id PHC hashes instead.
//!
//! All operations are synchronous and CPU-bound; async callers should run
//! them on a blocking worker.

mod binding;
pub mod crypto;
mod error;
pub mod format;

pub use crate::binding::{FieldBinder, FormPayload, KeySource};
pub use crate::crypto::{DerivationParams, ResourceLimits, SecretHash, SecretMaterial};
pub use crate::error::{Result, SealError};
pub use crate::format::EncryptedField;
