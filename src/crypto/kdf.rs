use argon2::{Algorithm, Argon2, Block, Params, Version};
use serde::Serialize;
use tracing::debug;
use zeroize::Zeroizing;

use super::{KEY_LEN, MAX_SALT_LEN, MIN_SALT_LEN, SALT_LEN, SecretMaterial, secure_random};
use crate::error::{Result, SealError};

/// Key derivation algorithms the envelope can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KdfAlgorithm {
    /// Argon2id, version 0x13.
    Argon2id,
}

impl KdfAlgorithm {
    pub fn id(self) -> u8 {
        match self {
            KdfAlgorithm::Argon2id => 1,
        }
    }

    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(KdfAlgorithm::Argon2id),
            _ => None,
        }
    }
}

/// Cost and algorithm configuration for key derivation.
///
/// The party re-deriving a key must use exactly the parameters the key was
/// derived with; envelopes carry them for that reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DerivationParams {
    algorithm: KdfAlgorithm,
    mem_cost_kib: u32,
    time_cost: u32,
    parallelism: u32,
    salt_len: usize,
}

impl Default for DerivationParams {
    fn default() -> Self {
        Self::interactive()
    }
}

impl DerivationParams {
    pub fn new(mem_cost_kib: u32, time_cost: u32, parallelism: u32) -> Result<Self> {
        let params = Self {
            algorithm: KdfAlgorithm::Argon2id,
            mem_cost_kib,
            time_cost,
            parallelism,
            salt_len: SALT_LEN,
        };
        params.validate()?;
        Ok(params)
    }

    /// 64 MiB, 2 passes. Suitable for low-value secrets entered interactively.
    pub fn interactive() -> Self {
        Self::preset(64 * 1024, 2)
    }

    /// 256 MiB, 3 passes. The floor for payment-adjacent fields.
    pub fn moderate() -> Self {
        Self::preset(256 * 1024, 3)
    }

    /// 1 GiB, 4 passes.
    pub fn sensitive() -> Self {
        Self::preset(1024 * 1024, 4)
    }

    fn preset(mem_cost_kib: u32, time_cost: u32) -> Self {
        Self {
            algorithm: KdfAlgorithm::Argon2id,
            mem_cost_kib,
            time_cost,
            parallelism: 1,
            salt_len: SALT_LEN,
        }
    }

    pub fn with_salt_len(mut self, salt_len: usize) -> Result<Self> {
        self.salt_len = salt_len;
        self.validate()?;
        Ok(self)
    }

    pub fn algorithm(&self) -> KdfAlgorithm {
        self.algorithm
    }

    pub fn mem_cost_kib(&self) -> u32 {
        self.mem_cost_kib
    }

    pub fn time_cost(&self) -> u32 {
        self.time_cost
    }

    pub fn parallelism(&self) -> u32 {
        self.parallelism
    }

    pub fn salt_len(&self) -> usize {
        self.salt_len
    }

    /// True if every cost is at least the matching cost of `floor`.
    pub fn is_at_least(&self, floor: &DerivationParams) -> bool {
        self.mem_cost_kib >= floor.mem_cost_kib
            && self.time_cost >= floor.time_cost
            && self.parallelism >= floor.parallelism
    }

    pub fn validate(&self) -> Result<()> {
        if self.time_cost < 1 {
            return Err(SealError::invalid("argon2 time cost must be >= 1"));
        }
        if self.parallelism < 1 {
            return Err(SealError::invalid("argon2 parallelism must be >= 1"));
        }
        if self.parallelism > Params::MAX_P_COST {
            return Err(SealError::invalid("argon2 parallelism too high"));
        }
        if self.mem_cost_kib < 8 * self.parallelism {
            return Err(SealError::invalid(
                "argon2 memory cost must be at least 8 * parallelism",
            ));
        }
        if !(MIN_SALT_LEN..=MAX_SALT_LEN).contains(&self.salt_len) {
            return Err(SealError::invalid(format!(
                "salt length must be between {MIN_SALT_LEN} and {MAX_SALT_LEN} bytes"
            )));
        }
        Ok(())
    }

    pub(crate) fn argon2(&self) -> Result<Argon2<'static>> {
        self.validate()?;
        let params = Params::new(
            self.mem_cost_kib,
            self.time_cost,
            self.parallelism,
            Some(KEY_LEN),
        )
        .map_err(map_argon2_error)?;

        Ok(match self.algorithm {
            KdfAlgorithm::Argon2id => Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }
}

/// Host-side ceiling on derivation cost.
///
/// Applied to locally chosen parameters and, more importantly, to parameters
/// read back out of envelopes and stored hashes. Memory, passes and lanes are
/// all capped, so neither allocation nor CPU time is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceLimits {
    max_mem_kib: u32,
    max_time_cost: u32,
    max_parallelism: u32,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_mem_kib: 1024 * 1024, // 1 GiB
            max_time_cost: 16,
            max_parallelism: 16,
        }
    }
}

impl ResourceLimits {
    /// Default pass and lane caps with a custom memory ceiling.
    pub fn new(max_mem_kib: u32) -> Self {
        Self {
            max_mem_kib,
            ..Self::default()
        }
    }

    pub fn with_max_time_cost(mut self, max_time_cost: u32) -> Self {
        self.max_time_cost = max_time_cost;
        self
    }

    pub fn with_max_parallelism(mut self, max_parallelism: u32) -> Self {
        self.max_parallelism = max_parallelism;
        self
    }

    pub fn max_mem_kib(&self) -> u32 {
        self.max_mem_kib
    }

    pub fn max_time_cost(&self) -> u32 {
        self.max_time_cost
    }

    pub fn max_parallelism(&self) -> u32 {
        self.max_parallelism
    }

    pub fn check(&self, params: &DerivationParams) -> Result<()> {
        self.check_costs(params.mem_cost_kib, params.time_cost, params.parallelism)
    }

    pub(crate) fn check_costs(
        &self,
        mem_cost_kib: u32,
        time_cost: u32,
        parallelism: u32,
    ) -> Result<()> {
        if mem_cost_kib > self.max_mem_kib {
            return Err(SealError::ResourceExhausted(format!(
                "argon2 memory cost {mem_cost_kib} KiB exceeds limit of {} KiB",
                self.max_mem_kib
            )));
        }
        if time_cost > self.max_time_cost {
            return Err(SealError::ResourceExhausted(format!(
                "argon2 time cost {time_cost} exceeds limit of {}",
                self.max_time_cost
            )));
        }
        if parallelism > self.max_parallelism {
            return Err(SealError::ResourceExhausted(format!(
                "argon2 parallelism {parallelism} exceeds limit of {}",
                self.max_parallelism
            )));
        }
        Ok(())
    }
}

/// Per-secret random salt. Not secret, but never shared between unrelated secrets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Salt(Vec<u8>);

impl Salt {
    pub fn generate(len: usize) -> Result<Self> {
        if !(MIN_SALT_LEN..=MAX_SALT_LEN).contains(&len) {
            return Err(SealError::invalid(format!("invalid salt length {len}")));
        }
        let mut salt = vec![0u8; len];
        secure_random(&mut salt)?;
        Ok(Self(salt))
    }

    pub fn from_slice(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Derives a 256-bit key from `secret` under the default [`ResourceLimits`].
pub fn derive(secret: &[u8], salt: &Salt, params: &DerivationParams) -> Result<SecretMaterial> {
    derive_within(secret, salt, params, &ResourceLimits::default())
}

/// Derives a 256-bit key from `secret`, refusing costs above `limits`.
///
/// # Errors
///
/// - [`SealError::InvalidInput`] for an empty secret, invalid params or a salt
///   whose length differs from `params.salt_len()`.
/// - [`SealError::ResourceExhausted`] when any cost is over the limit or the
///   allocation is refused.
pub fn derive_within(
    secret: &[u8],
    salt: &Salt,
    params: &DerivationParams,
    limits: &ResourceLimits,
) -> Result<SecretMaterial> {
    if secret.is_empty() {
        return Err(SealError::invalid("secret must not be empty"));
    }
    params.validate()?;
    if salt.len() != params.salt_len() {
        return Err(SealError::invalid(format!(
            "salt must be {} bytes, got {}",
            params.salt_len(),
            salt.len()
        )));
    }
    limits.check(params)?;

    let argon2 = params.argon2()?;
    debug!(
        mem_cost_kib = params.mem_cost_kib(),
        time_cost = params.time_cost(),
        parallelism = params.parallelism(),
        "deriving field key"
    );

    let block_count = argon2.params().block_count();
    let mut blocks: Vec<Block> = Vec::new();
    blocks.try_reserve_exact(block_count).map_err(|_| {
        SealError::ResourceExhausted(format!(
            "cannot allocate {} KiB for key derivation",
            params.mem_cost_kib()
        ))
    })?;
    blocks.resize(block_count, Block::default());

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    argon2
        .hash_password_into_with_memory(
            secret,
            salt.as_bytes(),
            key.as_mut_slice(),
            blocks.as_mut_slice(),
        )
        .map_err(map_argon2_error)?;

    Ok(SecretMaterial::from_zeroizing(key))
}

fn map_argon2_error(e: argon2::Error) -> SealError {
    match e {
        argon2::Error::MemoryTooMuch => SealError::ResourceExhausted(e.to_string()),
        other => SealError::invalid(format!("argon2: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast() -> DerivationParams {
        DerivationParams::new(1024, 1, 1).unwrap()
    }

    #[test]
    fn kdf_is_deterministic() {
        let salt = Salt::from_slice(&[42u8; 16]);
        let params = fast();

        let k1 = derive(b"password", &salt, &params).unwrap();
        let k2 = derive(b"password", &salt, &params).unwrap();

        assert_eq!(k1.expose(), k2.expose());
    }

    #[test]
    fn kdf_params_affect_output() {
        let salt = Salt::from_slice(&[7u8; 16]);

        let k1 = derive(b"pw", &salt, &DerivationParams::new(1024, 1, 1).unwrap()).unwrap();
        let k2 = derive(b"pw", &salt, &DerivationParams::new(2048, 1, 1).unwrap()).unwrap();
        let k3 = derive(b"pw", &salt, &DerivationParams::new(1024, 2, 1).unwrap()).unwrap();

        assert_ne!(k1.expose(), k2.expose());
        assert_ne!(k1.expose(), k3.expose());
    }

    #[test]
    fn secret_and_salt_affect_output() {
        let params = fast();
        let salt_a = Salt::from_slice(&[1u8; 16]);
        let salt_b = Salt::from_slice(&[2u8; 16]);

        let base = derive(b"1234", &salt_a, &params).unwrap();
        let other_secret = derive(b"1235", &salt_a, &params).unwrap();
        let other_salt = derive(b"1234", &salt_b, &params).unwrap();

        assert_ne!(base.expose(), other_secret.expose());
        assert_ne!(base.expose(), other_salt.expose());
    }

    #[test]
    fn kdf_invalid_params_fail_gracefully() {
        assert!(matches!(
            DerivationParams::new(0, 0, 0),
            Err(SealError::InvalidInput(_))
        ));
        assert!(DerivationParams::new(8, 1, 2).is_err());
        assert!(fast().with_salt_len(4).is_err());
        assert!(fast().with_salt_len(65).is_err());
    }

    #[test]
    fn empty_secret_is_rejected() {
        let salt = Salt::from_slice(&[0u8; 16]);
        assert!(matches!(
            derive(b"", &salt, &fast()),
            Err(SealError::InvalidInput(_))
        ));
    }

    #[test]
    fn salt_length_must_match_params() {
        let salt = Salt::from_slice(&[0u8; 12]);
        assert!(matches!(
            derive(b"pw", &salt, &fast()),
            Err(SealError::InvalidInput(_))
        ));

        let params = fast().with_salt_len(12).unwrap();
        assert!(derive(b"pw", &salt, &params).is_ok());
    }

    #[test]
    fn memory_cost_over_limit_is_resource_exhausted() {
        let salt = Salt::from_slice(&[0u8; 16]);
        let params = DerivationParams::new(4096, 1, 1).unwrap();
        let limits = ResourceLimits::new(2048);

        assert!(matches!(
            derive_within(b"pw", &salt, &params, &limits),
            Err(SealError::ResourceExhausted(_))
        ));
    }

    #[test]
    fn time_cost_over_limit_is_refused_before_deriving() {
        let salt = Salt::from_slice(&[0u8; 16]);
        let params = DerivationParams::new(1024, u32::MAX, 1).unwrap();

        assert!(matches!(
            derive(b"pw", &salt, &params),
            Err(SealError::ResourceExhausted(_))
        ));

        let limits = ResourceLimits::default().with_max_time_cost(1);
        assert!(matches!(
            derive_within(
                b"pw",
                &salt,
                &DerivationParams::new(1024, 2, 1).unwrap(),
                &limits
            ),
            Err(SealError::ResourceExhausted(_))
        ));
        assert!(derive_within(b"pw", &salt, &fast(), &limits).is_ok());
    }

    #[test]
    fn parallelism_over_limit_is_refused() {
        let limits = ResourceLimits::default().with_max_parallelism(2);
        let params = DerivationParams::new(1024, 1, 4).unwrap();
        assert!(matches!(
            limits.check(&params),
            Err(SealError::ResourceExhausted(_))
        ));
        limits.check(&DerivationParams::new(1024, 1, 2).unwrap()).unwrap();
    }

    #[test]
    fn cost_floor_comparison() {
        let floor = DerivationParams::interactive();
        assert!(DerivationParams::moderate().is_at_least(&floor));
        assert!(floor.is_at_least(&floor));
        assert!(!fast().is_at_least(&floor));
        assert!(!DerivationParams::new(1024 * 1024, 1, 1).unwrap().is_at_least(&floor));
    }

    #[test]
    fn presets_are_ordered_by_cost() {
        let i = DerivationParams::interactive();
        let m = DerivationParams::moderate();
        let s = DerivationParams::sensitive();

        assert!(i.mem_cost_kib() < m.mem_cost_kib() && m.mem_cost_kib() < s.mem_cost_kib());
        assert!(i.time_cost() < m.time_cost() && m.time_cost() < s.time_cost());
        for p in [i, m, s] {
            p.validate().unwrap();
            ResourceLimits::default().check(&p).unwrap();
        }
        assert_eq!(DerivationParams::default(), i);
    }

    #[test]
    fn generated_salts_are_fresh() {
        let a = Salt::generate(SALT_LEN).unwrap();
        let b = Salt::generate(SALT_LEN).unwrap();
        assert_eq!(a.len(), SALT_LEN);
        assert_ne!(a, b);
        assert!(Salt::generate(2).is_err());
    }

    #[test]
    fn params_serialize_with_algorithm_name() {
        let json = serde_json::to_value(fast()).unwrap();
        assert_eq!(json["algorithm"], "argon2id");
        assert_eq!(json["mem_cost_kib"], 1024);
    }
}
