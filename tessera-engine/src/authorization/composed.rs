//! Composed-proof authorization provider
//!
//! Tier-2/3 tenants authorize through an external verifier: the provider
//! submits a proof bundle and, on verification, receives content-set
//! references. Tier 2 falls back to the last cached authorization when
//! the verifier is unreachable; Tier 3 fails hard.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

use tessera_core::types::StorageTier;

use super::{AuthorizationProvider, AuthorizationRequest, AuthorizationResult, ContentSetRef};
use crate::error::{DenialReason, EngineResult};

const PROVIDER_NAME: &str = "composed_proof";

/// Proof bundle submitted to the external verifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofBundle {
    pub user_id: String,
    pub document_id: String,
    pub access_level_id: String,
    pub organization_id: String,
}

impl ProofBundle {
    fn from_request(request: &AuthorizationRequest) -> Self {
        Self {
            user_id: request.user_id.clone(),
            document_id: request.document_id.to_string(),
            access_level_id: request.access_level_id.clone(),
            organization_id: request.organization_id.to_string(),
        }
    }
}

/// External verifier outcomes
#[derive(Debug)]
pub enum VerifierError {
    /// The proof did not verify
    Rejected(String),
    /// The verifier cannot be reached
    Unavailable(String),
}

/// External proof verifier
#[async_trait]
pub trait ProofVerifier: Send + Sync {
    async fn verify(&self, bundle: &ProofBundle) -> Result<Vec<ContentSetRef>, VerifierError>;
}

/// Composed-proof authorization with tier-dependent outage behavior
pub struct ComposedProofProvider {
    verifier: Arc<dyn ProofVerifier>,
    tier: StorageTier,
    /// Last successful authorization per (user, document, level)
    cache: RwLock<HashMap<(String, String, String), AuthorizationResult>>,
}

impl ComposedProofProvider {
    pub fn new(verifier: Arc<dyn ProofVerifier>, tier: StorageTier) -> Self {
        Self {
            verifier,
            tier,
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn cache_key(request: &AuthorizationRequest) -> (String, String, String) {
        (
            request.user_id.clone(),
            request.document_id.to_string(),
            request.access_level_id.clone(),
        )
    }
}

#[async_trait]
impl AuthorizationProvider for ComposedProofProvider {
    async fn authorize(&self, request: &AuthorizationRequest) -> EngineResult<AuthorizationResult> {
        let bundle = ProofBundle::from_request(request);

        match self.verifier.verify(&bundle).await {
            Ok(refs) => {
                let result = AuthorizationResult::granted(
                    PROVIDER_NAME,
                    refs,
                    serde_json::json!({
                        "access_level_id": request.access_level_id,
                        "proof_verified": true,
                    }),
                );
                self.cache
                    .write()
                    .await
                    .insert(Self::cache_key(request), result.clone());
                Ok(result)
            }
            Err(VerifierError::Rejected(reason)) => {
                warn!(user_id = %request.user_id, reason = %reason, "proof rejected");
                Ok(AuthorizationResult::denied(
                    PROVIDER_NAME,
                    DenialReason::ProofFailed,
                ))
            }
            Err(VerifierError::Unavailable(reason)) => {
                if self.tier == StorageTier::Tier2 {
                    if let Some(cached) = self.cache.read().await.get(&Self::cache_key(request)) {
                        warn!(
                            user_id = %request.user_id,
                            reason = %reason,
                            "verifier unreachable, serving cached authorization"
                        );
                        let mut result = cached.clone();
                        result.audit_metadata = serde_json::json!({
                            "access_level_id": request.access_level_id,
                            "proof_verified": true,
                            "served_from_cache": true,
                        });
                        return Ok(result);
                    }
                }
                Ok(AuthorizationResult::denied(
                    PROVIDER_NAME,
                    DenialReason::ProviderUnavailable,
                ))
            }
        }
    }
}
