//! Deconstruction engine
//!
//! Turns an approved document plus its approved assignment set into a base
//! document of opaque markers and one independently encrypted envelope per
//! content set. The whole pipeline runs under the document's row lock and
//! commits atomically; any failure rolls back and rewinds the status to
//! `approved`.

use chrono::Utc;
use tracing::{info, warn};

use tessera_core::markers::{build_markers, serialize_base_document};
use tessera_core::crypto;
use tessera_core::logging::operations;
use tessera_core::types::{
    AuditCategory, AuditEvent, AnchorTransaction, BaseDocument, ContentSetId, Document,
    DocumentId, DocumentStatus, EncryptedContentSet, EncryptionKeyRecord, KeyShareRecord,
    SecurityProfile, Sha512Digest, StorageTier, AES_256_GCM,
};
use tessera_store::DeconstructionCommit;

use crate::engine::TesseraEngine;
use crate::error::{EngineError, EngineResult};

/// Summary of a committed deconstruction
#[derive(Debug)]
pub struct DeconstructionOutcome {
    pub document_id: DocumentId,
    pub content_sets: Vec<ContentSetId>,
    pub marker_count: usize,
    pub base_hash: Sha512Digest,
    pub anchor_tx_id: Option<String>,
}

/// Per-set facts carried into the anchor accrual
struct SetAccrual {
    set: ContentSetId,
    key_id: String,
    plaintext_hash: Sha512Digest,
    ciphertext_hash: Sha512Digest,
    storage_ref: String,
}

fn tier_path(tier: StorageTier) -> &'static str {
    match tier {
        StorageTier::Tier1 => "tier_1",
        StorageTier::Tier2 => "tier_2",
        StorageTier::Tier3 => "tier_3",
    }
}

impl TesseraEngine {
    /// Deconstruct an approved document.
    ///
    /// Protocol: lock the row, re-verify `approved`, transition to
    /// `deconstructing`, build markers, encrypt each content set under a
    /// fresh HSM key in ascending set order, commit everything atomically
    /// together with the `active` transition, then emit one audit event
    /// and one anchor submission.
    pub async fn deconstruct(
        &self,
        document_id: &DocumentId,
        session_id: &str,
    ) -> EngineResult<DeconstructionOutcome> {
        let _lock = self.ctx.documents.lock_document(document_id).await?;

        let document = self.require_document(document_id).await?;
        if document.status != DocumentStatus::Approved {
            return Err(EngineError::PreconditionViolation(format!(
                "document {} is {}, expected approved",
                document_id, document.status
            )));
        }
        let profile = self.require_profile(&document).await?;

        self.ctx
            .documents
            .update_status(document_id, DocumentStatus::Approved, DocumentStatus::Deconstructing)
            .await?;

        match self.deconstruct_locked(&document, &profile, session_id).await {
            Ok((outcome, accruals)) => {
                let anchor_tx_id = self
                    .emit_deconstruction_events(&document, &profile, session_id, &outcome, &accruals)
                    .await?;
                info!(
                    document_id = %document_id,
                    operation = operations::DECONSTRUCT,
                    content_sets = outcome.content_sets.len(),
                    marker_count = outcome.marker_count,
                    "document deconstructed"
                );
                Ok(DeconstructionOutcome {
                    anchor_tx_id,
                    ..outcome
                })
            }
            Err(e) => {
                // Best-effort status rewind; the commit itself never landed
                if let Err(rewind) = self
                    .ctx
                    .documents
                    .update_status(
                        document_id,
                        DocumentStatus::Deconstructing,
                        DocumentStatus::Approved,
                    )
                    .await
                {
                    warn!(
                        document_id = %document_id,
                        error = %rewind,
                        "status rewind after failed deconstruction also failed"
                    );
                }
                let _ = self
                    .ctx
                    .record_audit(
                        AuditEvent::new(
                            AuditCategory::Action,
                            "document.deconstruction_failed",
                            format!("deconstruction failed: {}", e),
                            "document",
                            document_id.to_string(),
                            serde_json::json!({ "session_id": session_id }),
                        )
                        .with_org(document.organization_id.clone()),
                    )
                    .await;
                Err(e)
            }
        }
    }

    /// Everything between the status transitions. Runs with the row lock
    /// held; returns the staged commit already applied.
    async fn deconstruct_locked(
        &self,
        document: &Document,
        profile: &SecurityProfile,
        session_id: &str,
    ) -> EngineResult<(DeconstructionOutcome, Vec<SetAccrual>)> {
        let assignments = self
            .ctx
            .assignments
            .load_approved_set(&document.id, session_id)
            .await?
            .ok_or_else(|| {
                EngineError::PreconditionViolation(format!(
                    "no approved markup session {} for document {}",
                    session_id, document.id
                ))
            })?;
        if assignments.is_empty() {
            return Err(EngineError::EmptyAssignmentSet);
        }

        let build = build_markers(&assignments)?;
        let base_content = serialize_base_document(&build.markers)?;
        let base_hash = Sha512Digest::compute(base_content.as_bytes());
        let marker_count = build.markers.len();

        let mut content_sets = Vec::new();
        let mut key_records = Vec::new();
        let mut share_records = Vec::new();
        let mut accruals = Vec::new();
        let mut set_ids = Vec::new();

        // Ascending set-identifier order: the payload map is a BTreeMap
        for (set, payload) in &build.payloads {
            let (handle, key_id) = self.ctx.hsm_generate_key().await?;

            let envelope = {
                // Key material lives exactly as long as this block
                let material = self.ctx.hsm_key_material(&handle).await?;
                crypto::encrypt(payload.as_bytes(), material.as_bytes(), &key_id, set)?
            };

            let record = EncryptionKeyRecord::new(
                key_id.clone(),
                document.id.clone(),
                set.clone(),
                document.organization_id.clone(),
                handle.clone(),
                AES_256_GCM,
                profile.shamir_threshold,
                profile.shamir_total_shares,
            )?;

            let holder_shares = self
                .ctx
                .hsm_split_key(&handle, profile.shamir_threshold, &profile.share_holder_ids)
                .await?;
            for holder_share in &holder_shares {
                share_records.push(KeyShareRecord::new(
                    key_id.clone(),
                    holder_share.share.index,
                    holder_share.holder_id.clone(),
                ));
            }
            // Share data is caller custody from here; dropping zeroizes
            drop(holder_shares);

            let storage_ref = format!("{}/{}/{}", tier_path(profile.storage_tier), document.id, set);
            accruals.push(SetAccrual {
                set: set.clone(),
                key_id: key_id.to_string(),
                plaintext_hash: envelope.plaintext_hash.clone(),
                ciphertext_hash: envelope.ciphertext_hash.clone(),
                storage_ref: storage_ref.clone(),
            });

            content_sets.push(EncryptedContentSet {
                document_id: document.id.clone(),
                content_set_identifier: set.clone(),
                envelope,
                storage_ref,
                key_id: key_id.clone(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            });
            key_records.push(record);
            set_ids.push(set.clone());
        }

        let base_document = BaseDocument {
            document_id: document.id.clone(),
            content: base_content,
            content_hash: base_hash.clone(),
            markers: build.markers,
            created_at: Utc::now(),
        };

        self.ctx
            .transactions
            .commit_deconstruction(DeconstructionCommit {
                document_id: document.id.clone(),
                base_document,
                content_sets,
                key_records,
                share_records,
            })
            .await?;

        Ok((
            DeconstructionOutcome {
                document_id: document.id.clone(),
                content_sets: set_ids,
                marker_count,
                base_hash,
                anchor_tx_id: None,
            },
            accruals,
        ))
    }

    /// Post-commit: one audit event, one anchor submission (best effort)
    async fn emit_deconstruction_events(
        &self,
        document: &Document,
        profile: &SecurityProfile,
        session_id: &str,
        outcome: &DeconstructionOutcome,
        accruals: &[SetAccrual],
    ) -> EngineResult<Option<String>> {
        self.ctx
            .record_audit(
                AuditEvent::new(
                    AuditCategory::Action,
                    "document.deconstructed",
                    "document deconstructed into encrypted content sets",
                    "document",
                    document.id.to_string(),
                    serde_json::json!({
                        "session_id": session_id,
                        "content_set_count": outcome.content_sets.len(),
                        "marker_count": outcome.marker_count,
                        "base_hash": outcome.base_hash,
                    }),
                )
                .with_org(document.organization_id.clone()),
            )
            .await?;

        let arrangement = serde_json::json!({
            "document_id": document.id,
            "content_sets": outcome.content_sets,
            "storage_tier": profile.storage_tier,
            "shamir": {
                "threshold": profile.shamir_threshold,
                "total_shares": profile.shamir_total_shares,
            },
        });
        let accrual = serde_json::json!({
            "base_hash": outcome.base_hash,
            "marker_count": outcome.marker_count,
            "sets": accruals.iter().map(|a| serde_json::json!({
                "content_set": a.set,
                "key_id": a.key_id,
                "plaintext_hash": a.plaintext_hash,
                "ciphertext_hash": a.ciphertext_hash,
                "storage_confirmation": a.storage_ref,
            })).collect::<Vec<_>>(),
        });

        Ok(self
            .ctx
            .submit_anchor(
                AnchorTransaction::new("document.deconstructed")
                    .with_arrangement(arrangement)
                    .with_accrual(accrual),
            )
            .await)
    }
}
