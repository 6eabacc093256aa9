//! Tessera Core Error Types
//!
//! Error definitions for the document confidentiality core: crypto
//! primitives, secret sharing, marker construction, and the document
//! lifecycle state machine.

use thiserror::Error;

use crate::types::DocumentStatus;

/// Core layer errors
#[derive(Debug, Error)]
pub enum CoreError {
    /// Symmetric key has the wrong length
    #[error("Invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    /// The OS random source failed
    #[error("Random generation failed: {0}")]
    RngFailure(String),

    /// Stored ciphertext hash does not match the ciphertext
    #[error("Ciphertext integrity check failed for content set {0}")]
    CiphertextIntegrityFailure(String),

    /// GCM authentication failed (tampered ciphertext, wrong key, or wrong AAD)
    #[error("AEAD authentication failed for content set {0}")]
    AeadAuthenticationFailure(String),

    /// Recovered plaintext hash does not match the envelope record
    #[error("Plaintext integrity check failed for content set {0}")]
    PlaintextIntegrityFailure(String),

    /// Fewer shares than the reconstruction threshold
    #[error("Insufficient shares: need {required}, got {provided}")]
    InsufficientShares { required: u8, provided: usize },

    /// Two shares carry the same index
    #[error("Duplicate share indices")]
    DuplicateShareIndices,

    /// Shares disagree on secret length
    #[error("Inconsistent share lengths")]
    InconsistentShareLength,

    /// Transition not permitted by the document lifecycle
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition {
        from: DocumentStatus,
        to: DocumentStatus,
    },

    /// Unexpected failure inside a crypto primitive
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Input validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Core Result type
pub type CoreResult<T> = Result<T, CoreError>;

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Serialization(err.to_string())
    }
}
