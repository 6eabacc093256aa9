//! FIPS 140-3 module provider
//!
//! Binds the HSM capability set to a network-attached FIPS 140-3 module.
//! The module performs generation, splitting and reconstruction on its
//! side of the boundary; this client only moves handles and (for
//! `get_key_material`) short-lived key copies.
//!
//! The implementation requires the `fips` feature. Without it a stub
//! compiles in that fails every call with [`HsmError::Unavailable`], so
//! provider selection can stay configuration-driven in all builds.

use serde::{Deserialize, Serialize};

/// Connection configuration for the FIPS module
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FipsConfig {
    /// Module base URL
    pub endpoint: String,
    /// Bearer token for the module session
    pub token: String,
    /// Logical partition within the module
    pub partition: Option<String>,
}

impl FipsConfig {
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            token: token.into(),
            partition: None,
        }
    }

    pub fn with_partition(mut self, partition: impl Into<String>) -> Self {
        self.partition = Some(partition.into());
        self
    }
}

#[cfg(feature = "fips")]
mod client {
    use async_trait::async_trait;
    use serde::Deserialize;

    use tessera_core::crypto::ShamirShare;
    use tessera_core::types::{KeyHandle, KeyId};

    use super::FipsConfig;
    use crate::error::{HsmError, HsmResult};
    use crate::provider::{HolderShare, HsmProvider, KeyMaterial};

    /// FIPS module client
    pub struct FipsHsmProvider {
        config: FipsConfig,
        client: reqwest::Client,
    }

    impl FipsHsmProvider {
        pub fn new(config: FipsConfig) -> HsmResult<Self> {
            let client = reqwest::Client::builder()
                .build()
                .map_err(|e| HsmError::Unavailable(format!("client construction failed: {}", e)))?;
            Ok(Self { config, client })
        }

        fn url(&self, path: &str) -> String {
            format!("{}/v1/{}", self.config.endpoint, path)
        }

        async fn post<T: for<'de> Deserialize<'de>>(
            &self,
            path: &str,
            body: serde_json::Value,
        ) -> HsmResult<T> {
            let mut request = self
                .client
                .post(self.url(path))
                .bearer_auth(&self.config.token)
                .json(&body);
            if let Some(partition) = &self.config.partition {
                request = request.header("X-Hsm-Partition", partition);
            }

            let response = request
                .send()
                .await
                .map_err(|e| HsmError::Unavailable(format!("module request failed: {}", e)))?;

            match response.status().as_u16() {
                404 => return Err(HsmError::KeyNotFound(path.to_string())),
                403 => return Err(HsmError::AccessDenied(path.to_string())),
                s if s >= 400 => {
                    return Err(HsmError::Unavailable(format!("module error ({})", s)))
                }
                _ => {}
            }

            response
                .json()
                .await
                .map_err(|e| HsmError::Unavailable(format!("bad module response: {}", e)))
        }
    }

    #[derive(Deserialize)]
    struct GenerateResponse {
        handle: String,
        key_id: String,
    }

    #[derive(Deserialize)]
    struct MaterialResponse {
        key_hex: String,
    }

    #[derive(Deserialize)]
    struct ShareResponse {
        index: u8,
        data_hex: String,
        holder_id: String,
    }

    #[async_trait]
    impl HsmProvider for FipsHsmProvider {
        async fn generate_key(&self) -> HsmResult<(KeyHandle, KeyId)> {
            let resp: GenerateResponse = self
                .post("keys", serde_json::json!({"algorithm": "aes-256-gcm"}))
                .await?;
            Ok((KeyHandle::new(resp.handle), KeyId::new(resp.key_id)))
        }

        async fn get_key_material(&self, handle: &KeyHandle) -> HsmResult<KeyMaterial> {
            let resp: MaterialResponse = self
                .post(
                    &format!("keys/{}/material", handle),
                    serde_json::json!({}),
                )
                .await?;
            let bytes = hex::decode(&resp.key_hex)
                .map_err(|e| HsmError::Unavailable(format!("bad key encoding: {}", e)))?;
            Ok(KeyMaterial::new(bytes))
        }

        async fn destroy_key(&self, handle: &KeyHandle) -> HsmResult<()> {
            match self
                .post::<serde_json::Value>(
                    &format!("keys/{}/destroy", handle),
                    serde_json::json!({}),
                )
                .await
            {
                Ok(_) | Err(HsmError::KeyNotFound(_)) => Ok(()),
                Err(e) => Err(e),
            }
        }

        async fn split_key_to_shares(
            &self,
            handle: &KeyHandle,
            threshold: u8,
            holder_ids: &[String],
        ) -> HsmResult<Vec<HolderShare>> {
            let resp: Vec<ShareResponse> = self
                .post(
                    &format!("keys/{}/shares", handle),
                    serde_json::json!({"threshold": threshold, "holders": holder_ids}),
                )
                .await?;

            resp.into_iter()
                .map(|s| {
                    let data = hex::decode(&s.data_hex)
                        .map_err(|e| HsmError::Unavailable(format!("bad share encoding: {}", e)))?;
                    Ok(HolderShare {
                        share: ShamirShare {
                            index: s.index,
                            data,
                        },
                        holder_id: s.holder_id,
                    })
                })
                .collect()
        }

        async fn reconstruct_key_from_shares(
            &self,
            shares: &[ShamirShare],
            threshold: u8,
        ) -> HsmResult<KeyMaterial> {
            let payload: Vec<serde_json::Value> = shares
                .iter()
                .map(|s| serde_json::json!({"index": s.index, "data_hex": hex::encode(&s.data)}))
                .collect();
            let resp: MaterialResponse = self
                .post(
                    "keys/reconstruct",
                    serde_json::json!({"threshold": threshold, "shares": payload}),
                )
                .await?;
            let bytes = hex::decode(&resp.key_hex)
                .map_err(|e| HsmError::Unavailable(format!("bad key encoding: {}", e)))?;
            Ok(KeyMaterial::new(bytes))
        }
    }
}

#[cfg(feature = "fips")]
pub use client::FipsHsmProvider;

/// Stub compiled when the `fips` feature is disabled
#[cfg(not(feature = "fips"))]
pub struct FipsHsmProvider {
    config: FipsConfig,
}

#[cfg(not(feature = "fips"))]
mod stub {
    use async_trait::async_trait;

    use tessera_core::crypto::ShamirShare;
    use tessera_core::types::{KeyHandle, KeyId};

    use super::FipsHsmProvider;
    use crate::error::{HsmError, HsmResult};
    use crate::provider::{HolderShare, HsmProvider, KeyMaterial};

    impl FipsHsmProvider {
        pub fn new(config: super::FipsConfig) -> HsmResult<Self> {
            Ok(Self { config })
        }

        fn unavailable(&self) -> HsmError {
            HsmError::Unavailable(format!(
                "FipsHsmProvider requires the 'fips' feature (endpoint: {})",
                self.config.endpoint
            ))
        }
    }

    #[async_trait]
    impl HsmProvider for FipsHsmProvider {
        async fn generate_key(&self) -> HsmResult<(KeyHandle, KeyId)> {
            Err(self.unavailable())
        }

        async fn get_key_material(&self, _handle: &KeyHandle) -> HsmResult<KeyMaterial> {
            Err(self.unavailable())
        }

        async fn destroy_key(&self, _handle: &KeyHandle) -> HsmResult<()> {
            Err(self.unavailable())
        }

        async fn split_key_to_shares(
            &self,
            _handle: &KeyHandle,
            _threshold: u8,
            _holder_ids: &[String],
        ) -> HsmResult<Vec<HolderShare>> {
            Err(self.unavailable())
        }

        async fn reconstruct_key_from_shares(
            &self,
            _shares: &[ShamirShare],
            _threshold: u8,
        ) -> HsmResult<KeyMaterial> {
            Err(self.unavailable())
        }
    }
}
