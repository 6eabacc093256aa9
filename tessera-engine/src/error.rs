//! Engine error taxonomy
//!
//! A failure inside an engine transaction rolls the transaction back and
//! attempts a status rewind (`deconstructing -> approved`,
//! `destroying -> active`); no partial persistence is ever visible.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use tessera_core::CoreError;
use tessera_hsm::HsmError;
use tessera_store::StoreError;

/// Why an authorization provider refused a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    NoGrant,
    Expired,
    Revoked,
    LevelInactive,
    ProofFailed,
    ProviderUnavailable,
}

impl std::fmt::Display for DenialReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NoGrant => "no_grant",
            Self::Expired => "expired",
            Self::Revoked => "revoked",
            Self::LevelInactive => "level_inactive",
            Self::ProofFailed => "proof_failed",
            Self::ProviderUnavailable => "provider_unavailable",
        };
        write!(f, "{}", s)
    }
}

/// Engine layer errors
#[derive(Debug, Error)]
pub enum EngineError {
    /// Wrong document state, missing session, or missing security
    /// profile. Client error; no state change.
    #[error("Precondition violation: {0}")]
    PreconditionViolation(String),

    /// Deconstruction invoked without assignments
    #[error("Approved assignment set is empty")]
    EmptyAssignmentSet,

    /// Reconstruction or export refused
    #[error("Authorization denied: {0}")]
    AuthorizationDenied(DenialReason),

    /// Base document content hash mismatch; always halts reconstruction
    #[error("Base document tampered")]
    BaseDocumentTampered,

    /// HSM unreachable or timed out; retryable, the caller's transaction
    /// rolls back
    #[error("HSM unavailable: {0}")]
    HsmUnavailable(String),

    /// Crypto primitive or Shamir failure
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Non-retryable HSM failure
    #[error(transparent)]
    Hsm(HsmError),

    /// Persistence failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Serialization(err.to_string())
    }
}

impl From<HsmError> for EngineError {
    fn from(err: HsmError) -> Self {
        match err {
            HsmError::Unavailable(msg) => EngineError::HsmUnavailable(msg),
            HsmError::Crypto(core) => EngineError::Core(core),
            other => EngineError::Hsm(other),
        }
    }
}

/// Engine Result type
pub type EngineResult<T> = Result<T, EngineError>;
