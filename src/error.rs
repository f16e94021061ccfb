use thiserror::Error;

/// Errors produced by the field encryption boundary.
///
/// Messages never contain secrets, keys or plaintext.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SealError {
    /// Malformed parameters, wrong-length salt or nonce, or a malformed envelope.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The requested derivation cost exceeds what the host or policy allows.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Tag mismatch on decrypt: wrong key or tampered data.
    #[error("authentication failed: wrong key or tampered data")]
    AuthenticationFailed,

    /// Envelope version or algorithm id this build does not implement.
    #[error("unsupported {what} id: {id}")]
    UnsupportedVersion { what: &'static str, id: u8 },
}

impl SealError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        SealError::InvalidInput(msg.into())
    }

    /// Returns `true` for failures that should be reported as security events.
    pub fn is_security_event(&self) -> bool {
        matches!(self, SealError::AuthenticationFailed)
    }
}

pub type Result<T, E = SealError> = std::result::Result<T, E>;
