//! Development HSM provider
//!
//! In-memory secure storage for Tier-1 development deployments. Keys are
//! derived with HKDF-SHA-512 from 32 bytes of fresh OS randomness, with a
//! per-key salt embedding the key id, so two generated keys never share
//! material even under a weak entropy source.
//!
//! # Security Warning
//!
//! Key material lives in process memory. This provider is suitable for
//! development and tests only; production tenants bind to a FIPS 140-3
//! module through [`crate::fips::FipsHsmProvider`].

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;
use zeroize::Zeroize;

use tessera_core::crypto::{kdf, shamir, ShamirShare};
use tessera_core::types::{KeyHandle, KeyId};
use tessera_core::CoreError;

use crate::error::{HsmError, HsmResult};
use crate::provider::{HolderShare, HsmProvider, KeyMaterial};

/// AES-256 key size
const KEY_SIZE: usize = 32;

/// Fixed HKDF info for AES key derivation
const KEY_INFO: &[u8] = b"tessera-aes-256-gcm";

/// In-memory development provider
pub struct DevHsmProvider {
    keys: RwLock<HashMap<KeyHandle, Vec<u8>>>,
}

impl DevHsmProvider {
    pub fn new() -> Self {
        Self {
            keys: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for DevHsmProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DevHsmProvider {
    fn drop(&mut self) {
        // Best-effort wipe of everything still held at teardown
        if let Ok(mut keys) = self.keys.try_write() {
            for (_, material) in keys.iter_mut() {
                material.zeroize();
            }
        }
    }
}

#[async_trait]
impl HsmProvider for DevHsmProvider {
    async fn generate_key(&self) -> HsmResult<(KeyHandle, KeyId)> {
        let key_id = KeyId::new(format!("key:{}", Uuid::new_v4()));
        let handle = KeyHandle::new(format!("hsm:dev:{}", Uuid::new_v4()));

        let mut ikm = [0u8; KEY_SIZE];
        getrandom::getrandom(&mut ikm)
            .map_err(|e| HsmError::Crypto(CoreError::RngFailure(e.to_string())))?;

        let salt = format!("tessera-key:{}", key_id);
        let material = kdf::hkdf_sha512(salt.as_bytes(), &ikm, KEY_INFO, KEY_SIZE)?;
        ikm.zeroize();

        self.keys.write().await.insert(handle.clone(), material);

        debug!(key_id = %key_id, "generated development HSM key");
        Ok((handle, key_id))
    }

    async fn get_key_material(&self, handle: &KeyHandle) -> HsmResult<KeyMaterial> {
        let keys = self.keys.read().await;
        let material = keys
            .get(handle)
            .ok_or_else(|| HsmError::KeyNotFound(handle.to_string()))?;
        Ok(KeyMaterial::new(material.clone()))
    }

    async fn destroy_key(&self, handle: &KeyHandle) -> HsmResult<()> {
        let mut keys = self.keys.write().await;
        if let Some(mut material) = keys.remove(handle) {
            material.zeroize();
            info!(handle = %handle, "destroyed development HSM key");
        }
        // Already-gone handles succeed: destruction is idempotent
        Ok(())
    }

    async fn split_key_to_shares(
        &self,
        handle: &KeyHandle,
        threshold: u8,
        holder_ids: &[String],
    ) -> HsmResult<Vec<HolderShare>> {
        if holder_ids.is_empty() || holder_ids.len() > u8::MAX as usize {
            return Err(HsmError::Crypto(CoreError::Validation(format!(
                "invalid holder count: {}",
                holder_ids.len()
            ))));
        }
        let total = holder_ids.len() as u8;

        let material = self.get_key_material(handle).await?;
        let shares = shamir::split(material.as_bytes(), threshold, total)?;
        drop(material);

        Ok(shares
            .into_iter()
            .zip(holder_ids.iter())
            .map(|(share, holder_id)| HolderShare {
                share,
                holder_id: holder_id.clone(),
            })
            .collect())
    }

    async fn reconstruct_key_from_shares(
        &self,
        shares: &[ShamirShare],
        threshold: u8,
    ) -> HsmResult<KeyMaterial> {
        let secret = shamir::reconstruct(shares, threshold)?;
        Ok(KeyMaterial::new(secret))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_generate_and_retrieve() {
        let hsm = DevHsmProvider::new();
        let (handle, key_id) = hsm.generate_key().await.unwrap();
        assert!(key_id.as_str().starts_with("key:"));

        let material = hsm.get_key_material(&handle).await.unwrap();
        assert_eq!(material.len(), KEY_SIZE);

        // Fresh copies are equal
        let again = hsm.get_key_material(&handle).await.unwrap();
        assert_eq!(material.as_bytes(), again.as_bytes());
    }

    #[tokio::test]
    async fn test_distinct_keys() {
        let hsm = DevHsmProvider::new();
        let (h1, _) = hsm.generate_key().await.unwrap();
        let (h2, _) = hsm.generate_key().await.unwrap();

        let k1 = hsm.get_key_material(&h1).await.unwrap();
        let k2 = hsm.get_key_material(&h2).await.unwrap();
        assert_ne!(k1.as_bytes(), k2.as_bytes());
    }

    #[tokio::test]
    async fn test_destroy_is_idempotent() {
        let hsm = DevHsmProvider::new();
        let (handle, _) = hsm.generate_key().await.unwrap();

        hsm.destroy_key(&handle).await.unwrap();
        assert!(matches!(
            hsm.get_key_material(&handle).await,
            Err(HsmError::KeyNotFound(_))
        ));

        // Second destroy succeeds silently
        hsm.destroy_key(&handle).await.unwrap();
    }

    #[tokio::test]
    async fn test_split_and_reconstruct() {
        let hsm = DevHsmProvider::new();
        let (handle, _) = hsm.generate_key().await.unwrap();
        let holders: Vec<String> = (1..=5).map(|i| format!("holder:{}", i)).collect();

        let shares = hsm.split_key_to_shares(&handle, 3, &holders).await.unwrap();
        assert_eq!(shares.len(), 5);
        assert_eq!(shares[0].holder_id, "holder:1");
        let indices: Vec<u8> = shares.iter().map(|s| s.share.index).collect();
        assert_eq!(indices, vec![1, 2, 3, 4, 5]);

        let subset: Vec<ShamirShare> = shares[..3].iter().map(|s| s.share.clone()).collect();
        let recovered = hsm.reconstruct_key_from_shares(&subset, 3).await.unwrap();

        let original = hsm.get_key_material(&handle).await.unwrap();
        assert_eq!(recovered.as_bytes(), original.as_bytes());
    }

    #[tokio::test]
    async fn test_reconstruct_below_threshold_fails() {
        let hsm = DevHsmProvider::new();
        let (handle, _) = hsm.generate_key().await.unwrap();
        let holders: Vec<String> = (1..=5).map(|i| format!("holder:{}", i)).collect();
        let shares = hsm.split_key_to_shares(&handle, 3, &holders).await.unwrap();

        let subset: Vec<ShamirShare> = vec![shares[1].share.clone(), shares[3].share.clone()];
        assert!(hsm.reconstruct_key_from_shares(&subset, 3).await.is_err());
    }
}
