//! HSM provider errors

use thiserror::Error;

/// Errors crossing the HSM boundary
#[derive(Debug, Error)]
pub enum HsmError {
    /// No key exists for the given handle
    #[error("Key not found for handle: {0}")]
    KeyNotFound(String),

    /// The module is unreachable or timed out; retryable
    #[error("HSM unavailable: {0}")]
    Unavailable(String),

    /// Provider rejected the request
    #[error("HSM access denied: {0}")]
    AccessDenied(String),

    /// Underlying crypto failure
    #[error(transparent)]
    Crypto(#[from] tessera_core::CoreError),
}

/// HSM Result type
pub type HsmResult<T> = Result<T, HsmError>;
