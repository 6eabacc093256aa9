//! HSM provider capability trait
//!
//! The HSM boundary is the trust boundary of the whole system: no caller
//! obtains key material by any path other than [`HsmProvider::get_key_material`],
//! and persisted key records reference keys only through opaque handles.
//!
//! Implementations should never log key material and must make
//! `destroy_key` idempotent.

use async_trait::async_trait;
use zeroize::Zeroize;

use tessera_core::crypto::ShamirShare;
use tessera_core::types::{KeyHandle, KeyId};

use crate::error::HsmResult;

/// 32-byte buffer that zeroizes on drop. Callers hold it only for the
/// span of one encrypt/decrypt; dropping it on every exit path, panics
/// included, is the zeroization guarantee.
#[derive(Clone)]
pub struct KeyMaterial(Vec<u8>);

impl KeyMaterial {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Raw key bytes. Do not copy out of the returned slice.
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

impl Drop for KeyMaterial {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyMaterial([REDACTED {} bytes])", self.0.len())
    }
}

/// A Shamir share paired with its holder assignment, as returned by
/// [`HsmProvider::split_key_to_shares`]. Share data is caller-owned from
/// this point; the core persists only the metadata.
#[derive(Debug, Clone)]
pub struct HolderShare {
    pub share: ShamirShare,
    pub holder_id: String,
}

/// Key lifecycle capabilities over an opaque handle
#[async_trait]
pub trait HsmProvider: Send + Sync {
    /// Generate a new 32-byte AES key inside the module. Returns the
    /// opaque handle and the key record identifier derived with it.
    async fn generate_key(&self) -> HsmResult<(KeyHandle, KeyId)>;

    /// Fetch a fresh copy of the key material. The caller is contractually
    /// required to drop (and thereby zeroize) the copy after use.
    async fn get_key_material(&self, handle: &KeyHandle) -> HsmResult<KeyMaterial>;

    /// Overwrite the key material with zeros and delete it. Idempotent:
    /// destroying an already-gone handle succeeds.
    async fn destroy_key(&self, handle: &KeyHandle) -> HsmResult<()>;

    /// Split the key behind `handle` into `holder_ids.len()` shares with
    /// the given threshold, pairing each share with its holder.
    async fn split_key_to_shares(
        &self,
        handle: &KeyHandle,
        threshold: u8,
        holder_ids: &[String],
    ) -> HsmResult<Vec<HolderShare>>;

    /// Reconstruct key material from `k >= threshold` shares.
    async fn reconstruct_key_from_shares(
        &self,
        shares: &[ShamirShare],
        threshold: u8,
    ) -> HsmResult<KeyMaterial>;
}
