//! Authorization providers
//!
//! The engines consume one capability: `authorize(request) -> Result`.
//! Which provider sits behind it is per-tenant configuration; the
//! reconstruction engine never branches on provider identity.

pub mod composed;
pub mod conventional;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use tessera_core::types::{ContentSetId, DocumentId, OrganizationId, Sha512Digest};

use crate::error::{DenialReason, EngineResult};

/// What the viewer wants to do with the reconstruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessType {
    Reconstruct,
    Export,
}

/// Authorization request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationRequest {
    pub user_id: String,
    pub document_id: DocumentId,
    pub access_level_id: String,
    pub organization_id: OrganizationId,
    pub access_type: AccessType,
}

/// Reference to one content set the viewer may read
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentSetRef {
    pub set_identifier: ContentSetId,
    pub storage_ref: String,
    /// Expected ciphertext hash, when the provider knows it
    pub encrypted_hash: Option<Sha512Digest>,
}

/// Authorization decision
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationResult {
    pub granted: bool,
    pub content_set_refs: Vec<ContentSetRef>,
    /// Provider name, recorded for audit only
    pub provider: String,
    pub denial_reason: Option<DenialReason>,
    pub audit_metadata: serde_json::Value,
}

impl AuthorizationResult {
    pub fn granted(
        provider: impl Into<String>,
        content_set_refs: Vec<ContentSetRef>,
        audit_metadata: serde_json::Value,
    ) -> Self {
        Self {
            granted: true,
            content_set_refs,
            provider: provider.into(),
            denial_reason: None,
            audit_metadata,
        }
    }

    pub fn denied(provider: impl Into<String>, reason: DenialReason) -> Self {
        Self {
            granted: false,
            content_set_refs: Vec::new(),
            provider: provider.into(),
            denial_reason: Some(reason),
            audit_metadata: serde_json::json!({ "denial_reason": reason }),
        }
    }
}

/// Authorization capability consumed by the reconstruction engine
#[async_trait]
pub trait AuthorizationProvider: Send + Sync {
    async fn authorize(&self, request: &AuthorizationRequest) -> EngineResult<AuthorizationResult>;
}

pub use composed::{ComposedProofProvider, ProofBundle, ProofVerifier, VerifierError};
pub use conventional::ConventionalProvider;
