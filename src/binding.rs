//! Sensitive-field binding for form payloads.
//!
//! [`FieldBinder`] is the only form-aware piece: it knows which fields are
//! sensitive and runs them through derive -> encrypt -> encode on the way out
//! and decode -> derive -> decrypt on the way in. Both directions are
//! all-or-nothing.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::crypto::{
    self, AeadAlgorithm, DerivationParams, ResourceLimits, Salt, SecretMaterial,
};
use crate::error::{Result, SealError};
use crate::format::{self, DerivedKey, EncryptedField, KeyBinding};

/// Field name to raw field value.
pub type FormPayload = BTreeMap<String, String>;

/// Where field keys come from.
pub enum KeySource {
    /// A shared passphrase; every field gets a fresh salt and its own key.
    Passphrase {
        secret: Zeroizing<Vec<u8>>,
        params: DerivationParams,
    },
    /// A key provisioned out of band, named in envelopes by `key_id`.
    Provisioned { key_id: u32, key: SecretMaterial },
}

impl KeySource {
    pub fn passphrase(secret: impl AsRef<[u8]>, params: DerivationParams) -> Self {
        KeySource::Passphrase {
            secret: Zeroizing::new(secret.as_ref().to_vec()),
            params,
        }
    }

    pub fn provisioned(key_id: u32, key: SecretMaterial) -> Self {
        KeySource::Provisioned { key_id, key }
    }
}

pub struct FieldBinder {
    sensitive: BTreeSet<String>,
    keys: KeySource,
    limits: ResourceLimits,
}

impl FieldBinder {
    pub fn new<I, S>(sensitive: I, keys: KeySource) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            sensitive: sensitive.into_iter().map(Into::into).collect(),
            keys,
            limits: ResourceLimits::default(),
        }
    }

    /// Caps the derivation cost accepted from incoming envelopes.
    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn is_sensitive(&self, field: &str) -> bool {
        self.sensitive.contains(field)
    }

    /// Replaces every sensitive field's value with its encoded envelope.
    ///
    /// Absent sensitive fields are skipped. If any field fails, the whole
    /// payload fails and nothing is returned.
    pub fn seal(&self, payload: &FormPayload) -> Result<FormPayload> {
        if let KeySource::Passphrase { params, .. } = &self.keys {
            params.validate()?;
            self.limits.check(params)?;
        }

        let mut out = FormPayload::new();
        for (name, value) in payload {
            if !self.is_sensitive(name) {
                out.insert(name.clone(), value.clone());
                continue;
            }
            let envelope = self.seal_field(name, value.as_bytes())?;
            debug!(field = %name, "sealed sensitive field");
            out.insert(name.clone(), envelope.encode());
        }
        Ok(out)
    }

    /// Replaces every sensitive field's envelope with the recovered plaintext.
    ///
    /// Values recovered before a failure are wiped, not returned.
    pub fn open(&self, payload: &FormPayload) -> Result<FormPayload> {
        let mut opened: Vec<(&str, Zeroizing<String>)> = Vec::new();
        for (name, value) in payload {
            if !self.is_sensitive(name) {
                continue;
            }
            match self.open_field(name, value) {
                Ok(plaintext) => opened.push((name.as_str(), plaintext)),
                Err(e) => {
                    if e.is_security_event() {
                        warn!(field = %name, "authentication failed on sealed field");
                    }
                    return Err(e);
                }
            }
        }

        let mut out: FormPayload = payload
            .iter()
            .filter(|(name, _)| !self.is_sensitive(name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        for (name, mut plaintext) in opened {
            out.insert(name.to_string(), std::mem::take(&mut *plaintext));
        }
        debug!(fields = out.len(), "opened payload");
        Ok(out)
    }

    /// Encrypts one value for `field`.
    pub fn seal_field(&self, field: &str, plaintext: &[u8]) -> Result<EncryptedField> {
        let algorithm = AeadAlgorithm::default();
        match &self.keys {
            KeySource::Passphrase { secret, params } => {
                let salt = Salt::generate(params.salt_len())?;
                let key = crypto::derive_within(secret, &salt, params, &self.limits)?;
                let binding = KeyBinding::Derived(DerivedKey::new(*params, salt)?);
                let aad = format::associated_data(algorithm, &binding, field);
                let sealed = crypto::encrypt(plaintext, &key, &aad)?;
                Ok(EncryptedField::new(algorithm, binding, sealed))
            }
            KeySource::Provisioned { key_id, key } => {
                let binding = KeyBinding::Provisioned { key_id: *key_id };
                let aad = format::associated_data(algorithm, &binding, field);
                let sealed = crypto::encrypt(plaintext, key, &aad)?;
                Ok(EncryptedField::new(algorithm, binding, sealed))
            }
        }
    }

    /// Decodes and decrypts one envelope for `field`.
    pub fn open_field(&self, field: &str, text: &str) -> Result<Zeroizing<String>> {
        let envelope = EncryptedField::decode(text)?;
        let aad = envelope.associated_data(field);

        let plaintext = match (envelope.key(), &self.keys) {
            (KeyBinding::Derived(derived), KeySource::Passphrase { secret, .. }) => {
                let key = crypto::derive_within(
                    secret,
                    derived.salt(),
                    derived.params(),
                    &self.limits,
                )?;
                crypto::decrypt(envelope.nonce(), envelope.ciphertext(), &key, &aad)?
            }
            (KeyBinding::Provisioned { key_id }, KeySource::Provisioned { key_id: ours, key })
                if key_id == ours =>
            {
                crypto::decrypt(envelope.nonce(), envelope.ciphertext(), key, &aad)?
            }
            (KeyBinding::Provisioned { key_id }, KeySource::Provisioned { .. }) => {
                return Err(SealError::invalid(format!("unknown key id {key_id}")));
            }
            _ => {
                return Err(SealError::invalid(
                    "envelope key binding does not match configured key source",
                ));
            }
        };

        let text = std::str::from_utf8(&plaintext)
            .map_err(|_| SealError::invalid("decrypted field is not valid UTF-8"))?;
        Ok(Zeroizing::new(text.to_string()))
    }
}
