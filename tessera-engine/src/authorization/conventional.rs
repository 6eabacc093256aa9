//! Conventional authorization provider
//!
//! Consults a grants table for an active, non-revoked, non-expired grant
//! matching the request, then resolves the access level to its content
//! sets. An access level is a non-hierarchical set: content assigned to
//! any set the level includes is visible to the viewer.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use tessera_store::{AccessLevelStore, ContentSetStore, GrantStore};

use super::{
    AuthorizationProvider, AuthorizationRequest, AuthorizationResult, ContentSetRef,
};
use crate::error::{DenialReason, EngineResult};

const PROVIDER_NAME: &str = "conventional";

/// Grants-table authorization
pub struct ConventionalProvider {
    grants: Arc<dyn GrantStore>,
    access_levels: Arc<dyn AccessLevelStore>,
    content_sets: Arc<dyn ContentSetStore>,
}

impl ConventionalProvider {
    pub fn new(
        grants: Arc<dyn GrantStore>,
        access_levels: Arc<dyn AccessLevelStore>,
        content_sets: Arc<dyn ContentSetStore>,
    ) -> Self {
        Self {
            grants,
            access_levels,
            content_sets,
        }
    }
}

#[async_trait]
impl AuthorizationProvider for ConventionalProvider {
    async fn authorize(&self, request: &AuthorizationRequest) -> EngineResult<AuthorizationResult> {
        let grant = self
            .grants
            .find_grant(
                &request.user_id,
                &request.document_id,
                &request.access_level_id,
                &request.organization_id,
            )
            .await?;

        let Some(grant) = grant else {
            debug!(user_id = %request.user_id, document_id = %request.document_id, "no grant");
            return Ok(AuthorizationResult::denied(PROVIDER_NAME, DenialReason::NoGrant));
        };
        if grant.revoked_at.is_some() {
            return Ok(AuthorizationResult::denied(PROVIDER_NAME, DenialReason::Revoked));
        }
        if grant.is_expired() {
            return Ok(AuthorizationResult::denied(PROVIDER_NAME, DenialReason::Expired));
        }

        let level = self
            .access_levels
            .get_access_level(&request.organization_id, &request.access_level_id)
            .await?;
        let Some(level) = level else {
            return Ok(AuthorizationResult::denied(
                PROVIDER_NAME,
                DenialReason::LevelInactive,
            ));
        };
        if !level.is_active {
            return Ok(AuthorizationResult::denied(
                PROVIDER_NAME,
                DenialReason::LevelInactive,
            ));
        }

        // Non-hierarchical union: every set the level names, as stored
        let mut refs = Vec::with_capacity(level.content_sets.len());
        for set in &level.content_sets {
            let row = self
                .content_sets
                .get_content_set(&request.document_id, set)
                .await?;
            match row {
                Some(row) => refs.push(ContentSetRef {
                    set_identifier: set.clone(),
                    storage_ref: row.storage_ref.clone(),
                    encrypted_hash: Some(row.envelope.ciphertext_hash.clone()),
                }),
                // A set the level names but the document never used
                None => refs.push(ContentSetRef {
                    set_identifier: set.clone(),
                    storage_ref: String::new(),
                    encrypted_hash: None,
                }),
            }
        }

        Ok(AuthorizationResult::granted(
            PROVIDER_NAME,
            refs,
            serde_json::json!({
                "access_level_id": request.access_level_id,
                "granted_at": grant.granted_at,
            }),
        ))
    }
}
