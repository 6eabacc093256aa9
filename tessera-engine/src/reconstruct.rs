//! Reconstruction engine
//!
//! Assembles a viewer-tailored view: authorized, integrity-verified
//! content is revealed; everything else is replaced by the tenant's
//! uniform-width redaction marker. Content belongs to the union of its
//! assignment sets, so a viewer sees it iff they are authorized for at
//! least one of those sets.
//!
//! Base-document tampering always halts. A per-set integrity failure
//! marks that set unverified and either proceeds with redaction or halts,
//! per the tenant's policy.

use std::collections::{BTreeMap, HashMap};
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use tessera_core::crypto;
use tessera_core::logging::operations;
use tessera_core::markers::{parse_payload, PayloadRecord};
use tessera_core::types::{
    AnchorTransaction, AuditCategory, AuditEvent, ContentSetId, Document, DocumentId,
    DocumentStatus, IntegrityFailurePolicy, ReconstructedBlock, ReconstructedView,
    ReconstructionEvent, SecurityProfile, Sha512Digest,
};
use tessera_core::CoreError;

use crate::authorization::{AccessType, AuthorizationRequest};
use crate::engine::TesseraEngine;
use crate::error::{EngineError, EngineResult};

impl TesseraEngine {
    /// Reconstruct a tailored view of an active document for one viewer.
    pub async fn reconstruct(
        &self,
        document_id: &DocumentId,
        viewer_id: &str,
        access_level_id: &str,
    ) -> EngineResult<ReconstructedView> {
        let document = self.require_document(document_id).await?;
        if document.status != DocumentStatus::Active {
            return Err(EngineError::PreconditionViolation(format!(
                "document {} is {}, expected active",
                document_id, document.status
            )));
        }
        let profile = self.require_profile(&document).await?;

        // Step 1: authorization, provider-agnostic
        let request = AuthorizationRequest {
            user_id: viewer_id.to_string(),
            document_id: document_id.clone(),
            access_level_id: access_level_id.to_string(),
            organization_id: document.organization_id.clone(),
            access_type: AccessType::Reconstruct,
        };
        let auth = self.ctx.authorization.authorize(&request).await?;
        if !auth.granted {
            let reason = auth
                .denial_reason
                .unwrap_or(crate::error::DenialReason::NoGrant);
            self.record_denied(&document, viewer_id, access_level_id, &profile, reason)
                .await?;
            return Err(EngineError::AuthorizationDenied(reason));
        }

        // Step 2: base document integrity; tampering always halts
        let base = self
            .ctx
            .base_documents
            .get_base_document(document_id)
            .await?
            .ok_or_else(|| {
                EngineError::PreconditionViolation(format!(
                    "no base document for {}",
                    document_id
                ))
            })?;
        if !base.verify_content_hash() {
            self.record_integrity_failure(&document, viewer_id, "base_document_hash", None)
                .await?;
            return Err(EngineError::BaseDocumentTampered);
        }

        // Step 3: retrieve, verify, decrypt each authorized set
        let mut verified: BTreeMap<ContentSetId, HashMap<Uuid, PayloadRecord>> = BTreeMap::new();
        let mut unverified: Vec<ContentSetId> = Vec::new();

        for set_ref in &auth.content_set_refs {
            let set = &set_ref.set_identifier;
            if verified.contains_key(set) || unverified.contains(set) {
                continue;
            }

            let Some(row) = self.ctx.content_sets.get_content_set(document_id, set).await? else {
                // The access level names a set this document never used
                continue;
            };

            if !row.envelope.verify_ciphertext_hash() {
                self.set_unverified(
                    &document,
                    viewer_id,
                    set,
                    "ciphertext_hash",
                    &profile,
                    &mut unverified,
                )
                .await?;
                continue;
            }

            let key = self
                .ctx
                .keys
                .active_key_for(document_id, set)
                .await?
                .ok_or_else(|| {
                    EngineError::PreconditionViolation(format!(
                        "no active key for {}/{}",
                        document_id, set
                    ))
                })?;

            // Key material is scoped to this block; dropping zeroizes it
            // on success and on every error path.
            let decrypted = {
                let material = self.ctx.hsm_key_material(&key.hsm_key_handle).await?;
                crypto::decrypt(&row.envelope, material.as_bytes())
            };

            match decrypted {
                Ok(plaintext) => {
                    let text = String::from_utf8(plaintext).map_err(|_| {
                        EngineError::Core(CoreError::Serialization(format!(
                            "payload for {} is not UTF-8",
                            set
                        )))
                    })?;
                    verified.insert(set.clone(), parse_payload(&text)?);
                }
                Err(
                    e @ (CoreError::CiphertextIntegrityFailure(_)
                    | CoreError::AeadAuthenticationFailure(_)
                    | CoreError::PlaintextIntegrityFailure(_)),
                ) => {
                    let stage = match &e {
                        CoreError::CiphertextIntegrityFailure(_) => "ciphertext_hash",
                        CoreError::AeadAuthenticationFailure(_) => "aead_authentication",
                        _ => "plaintext_hash",
                    };
                    self.set_unverified(&document, viewer_id, set, stage, &profile, &mut unverified)
                        .await?;
                }
                Err(other) => return Err(other.into()),
            }
        }

        // Steps 4-5: assemble, redacting by the cross-set visibility rule
        let redaction = profile.redaction_marker();
        let mut markers = base.markers.clone();
        markers.sort_by_key(|m| m.sequence_position);

        let mut blocks = Vec::with_capacity(markers.len());
        for marker in &markers {
            let mut revealed: Option<(ContentSetId, String)> = None;
            for set in &marker.content_set_membership {
                if let Some(records) = verified.get(set) {
                    if let Some(record) = records.get(&marker.marker_id) {
                        if Sha512Digest::compute(record.content.as_bytes()) == marker.content_hash {
                            revealed = Some((set.clone(), record.content.clone()));
                        } else {
                            // Tampered after decryption: treat as redacted
                            warn!(
                                document_id = %document_id,
                                marker_id = %marker.marker_id,
                                "marker content hash mismatch, redacting"
                            );
                            self.record_integrity_failure(
                                &document,
                                viewer_id,
                                "marker_content_hash",
                                Some(set),
                            )
                            .await?;
                        }
                        break;
                    }
                }
            }

            blocks.push(match revealed {
                Some((set, content)) => ReconstructedBlock {
                    marker_id: marker.marker_id,
                    block_id: marker.block_id.clone(),
                    content,
                    is_redacted: false,
                    accessed_via_set: Some(set),
                },
                None => ReconstructedBlock {
                    marker_id: marker.marker_id,
                    block_id: marker.block_id.clone(),
                    content: redaction.clone(),
                    is_redacted: true,
                    accessed_via_set: None,
                },
            });
        }

        let reconstruction_hash = Sha512Digest::compute(serde_json::to_string(&blocks)?.as_bytes());
        let integrity_all_passed = unverified.is_empty();

        let used: Vec<ContentSetId> = verified.keys().cloned().collect();
        let mut redacted_sets: Vec<ContentSetId> = Vec::new();
        for marker in &markers {
            for set in &marker.content_set_membership {
                if !used.contains(set) && !redacted_sets.contains(set) {
                    redacted_sets.push(set.clone());
                }
            }
        }
        redacted_sets.sort();

        // Steps 6-8: anchor action record, event persistence, audit
        let anchor_tx_id = self
            .ctx
            .submit_anchor(
                AnchorTransaction::new("document.reconstructed").with_action(serde_json::json!({
                    "document_id": document_id,
                    "viewer_id": viewer_id,
                    "access_level_id": access_level_id,
                    "content_sets_used": used,
                    "content_sets_redacted": redacted_sets,
                    "reconstruction_hash": reconstruction_hash,
                    "integrity_all_passed": integrity_all_passed,
                })),
            )
            .await;

        self.ctx
            .reconstructions
            .record_reconstruction(ReconstructionEvent {
                id: Uuid::new_v4(),
                document_id: document_id.clone(),
                viewer_id: viewer_id.to_string(),
                access_level_id: access_level_id.to_string(),
                content_sets_used: used,
                content_sets_redacted: redacted_sets,
                marker_width: profile.marker_width,
                reconstruction_hash: reconstruction_hash.clone(),
                integrity_all_passed,
                anchor_tx_id: anchor_tx_id.clone(),
                occurred_at: Utc::now(),
            })
            .await?;

        self.ctx
            .record_audit(
                AuditEvent::new(
                    AuditCategory::Action,
                    "document.reconstructed",
                    "tailored view assembled",
                    "document",
                    document_id.to_string(),
                    serde_json::json!({
                        "viewer_id": viewer_id,
                        "access_level_id": access_level_id,
                        "block_count": blocks.len(),
                        "integrity_all_passed": integrity_all_passed,
                        "provider": auth.provider,
                    }),
                )
                .with_org(document.organization_id.clone())
                .with_actor(viewer_id),
            )
            .await?;

        info!(
            document_id = %document_id,
            viewer_id = %viewer_id,
            operation = operations::RECONSTRUCT,
            blocks = blocks.len(),
            integrity_all_passed,
            "document reconstructed"
        );

        Ok(ReconstructedView {
            document_id: document_id.clone(),
            viewer_id: viewer_id.to_string(),
            blocks,
            marker_width: profile.marker_width,
            reconstruction_hash,
            integrity_all_passed,
        })
    }

    /// Mark a set unverified, audit the stage, and halt if the tenant's
    /// policy says so.
    async fn set_unverified(
        &self,
        document: &Document,
        viewer_id: &str,
        set: &ContentSetId,
        stage: &str,
        profile: &SecurityProfile,
        unverified: &mut Vec<ContentSetId>,
    ) -> EngineResult<()> {
        unverified.push(set.clone());
        self.record_integrity_failure(document, viewer_id, stage, Some(set)).await?;

        if profile.integrity_failure_policy == IntegrityFailurePolicy::Halt {
            return Err(EngineError::Core(match stage {
                "aead_authentication" => CoreError::AeadAuthenticationFailure(set.to_string()),
                "plaintext_hash" => CoreError::PlaintextIntegrityFailure(set.to_string()),
                _ => CoreError::CiphertextIntegrityFailure(set.to_string()),
            }));
        }
        Ok(())
    }

    /// One `reconstruction.integrity_failure` audit event naming the stage
    async fn record_integrity_failure(
        &self,
        document: &Document,
        viewer_id: &str,
        stage: &str,
        set: Option<&ContentSetId>,
    ) -> EngineResult<()> {
        self.ctx
            .record_audit(
                AuditEvent::new(
                    AuditCategory::Action,
                    "reconstruction.integrity_failure",
                    format!("integrity verification failed at stage {}", stage),
                    "document",
                    document.id.to_string(),
                    serde_json::json!({
                        "stage": stage,
                        "content_set": set,
                        "viewer_id": viewer_id,
                    }),
                )
                .with_org(document.organization_id.clone())
                .with_actor(viewer_id),
            )
            .await?;
        Ok(())
    }

    /// Audit a refusal and persist the refused attempt. No anchor.
    async fn record_denied(
        &self,
        document: &Document,
        viewer_id: &str,
        access_level_id: &str,
        profile: &SecurityProfile,
        reason: crate::error::DenialReason,
    ) -> EngineResult<()> {
        self.ctx
            .record_audit(
                AuditEvent::new(
                    AuditCategory::Action,
                    "reconstruction.denied",
                    format!("reconstruction refused: {}", reason),
                    "document",
                    document.id.to_string(),
                    serde_json::json!({
                        "viewer_id": viewer_id,
                        "access_level_id": access_level_id,
                        "denial_reason": reason,
                    }),
                )
                .with_org(document.organization_id.clone())
                .with_actor(viewer_id),
            )
            .await?;

        self.ctx
            .reconstructions
            .record_reconstruction(ReconstructionEvent {
                id: Uuid::new_v4(),
                document_id: document.id.clone(),
                viewer_id: viewer_id.to_string(),
                access_level_id: access_level_id.to_string(),
                content_sets_used: Vec::new(),
                content_sets_redacted: Vec::new(),
                marker_width: profile.marker_width,
                reconstruction_hash: Sha512Digest::compute(b"[]"),
                integrity_all_passed: false,
                anchor_tx_id: None,
                occurred_at: Utc::now(),
            })
            .await?;
        Ok(())
    }
}
