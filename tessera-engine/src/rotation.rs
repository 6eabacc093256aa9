//! Key rotation engine
//!
//! Re-encrypts every active envelope under a fresh HSM key in one
//! transaction. Old key records are deactivated, successors chain back
//! through `rotated_from_key_id` and inherit the tenant's (M, N), and the
//! plaintext hash of every envelope is preserved - reconstruction
//! immediately after rotation yields identical visible content.

use chrono::Utc;
use tracing::{info, warn};

use tessera_core::crypto;
use tessera_core::logging::operations;
use tessera_core::types::{
    AnchorTransaction, AuditCategory, AuditEvent, ContentSetId, DocumentId, DocumentStatus,
    KeyId, KeyShareRecord,
};
use tessera_store::RotationCommit;

use crate::engine::TesseraEngine;
use crate::error::{EngineError, EngineResult};

/// Summary of one committed rotation
#[derive(Debug)]
pub struct RotationOutcome {
    pub document_id: DocumentId,
    /// `(content_set, old_key_id, new_key_id)` per rotated envelope
    pub rotated: Vec<(ContentSetId, KeyId, KeyId)>,
    pub anchor_tx_id: Option<String>,
}

impl TesseraEngine {
    /// Rotate every active content-set key of an active document.
    pub async fn rotate_keys(&self, document_id: &DocumentId) -> EngineResult<RotationOutcome> {
        let _lock = self.ctx.documents.lock_document(document_id).await?;

        let document = self.require_document(document_id).await?;
        if document.status != DocumentStatus::Active {
            return Err(EngineError::PreconditionViolation(format!(
                "document {} is {}, expected active",
                document_id, document.status
            )));
        }
        let profile = self.require_profile(&document).await?;

        let rows = self.ctx.content_sets.list_content_sets(document_id).await?;
        if rows.is_empty() {
            return Err(EngineError::PreconditionViolation(format!(
                "document {} has no content sets to rotate",
                document_id
            )));
        }

        let result = async {
            let mut deactivated = Vec::new();
            let mut new_keys = Vec::new();
            let mut new_shares = Vec::new();
            let mut updated_rows = Vec::new();
            let mut rotated = Vec::new();

            for mut row in rows {
                let set = row.content_set_identifier.clone();
                let mut old_key = self
                    .ctx
                    .keys
                    .active_key_for(document_id, &set)
                    .await?
                    .ok_or_else(|| {
                        EngineError::PreconditionViolation(format!(
                            "no active key for {}/{}",
                            document_id, set
                        ))
                    })?;

                let (new_handle, new_key_id) = self.ctx.hsm_generate_key().await?;

                let new_envelope = {
                    // Both key copies are scoped to this block
                    let old_material = self.ctx.hsm_key_material(&old_key.hsm_key_handle).await?;
                    let new_material = self.ctx.hsm_key_material(&new_handle).await?;
                    crypto::re_encrypt(
                        &row.envelope,
                        old_material.as_bytes(),
                        new_material.as_bytes(),
                        &new_key_id,
                    )?
                };

                let new_record = old_key.rotated_successor(new_key_id.clone(), new_handle.clone());
                old_key.deactivate_rotated();

                let holder_shares = self
                    .ctx
                    .hsm_split_key(&new_handle, new_record.shamir_threshold, &profile.share_holder_ids)
                    .await?;
                for holder_share in &holder_shares {
                    new_shares.push(KeyShareRecord::new(
                        new_key_id.clone(),
                        holder_share.share.index,
                        holder_share.holder_id.clone(),
                    ));
                }
                drop(holder_shares);

                rotated.push((set, old_key.id.clone(), new_key_id.clone()));

                row.envelope = new_envelope;
                row.key_id = new_key_id;
                row.updated_at = Utc::now();

                deactivated.push(old_key);
                new_keys.push(new_record);
                updated_rows.push(row);
            }

            self.ctx
                .transactions
                .commit_rotation(RotationCommit {
                    document_id: document_id.clone(),
                    deactivated_keys: deactivated,
                    new_keys,
                    new_shares,
                    updated_content_sets: updated_rows,
                })
                .await?;

            Ok(rotated)
        }
        .await;

        match result {
            Ok(rotated) => {
                self.ctx
                    .record_audit(
                        AuditEvent::new(
                            AuditCategory::Action,
                            "document.keys_rotated",
                            "all content-set keys rotated",
                            "document",
                            document_id.to_string(),
                            serde_json::json!({
                                "rotated_count": rotated.len(),
                            }),
                        )
                        .with_org(document.organization_id.clone()),
                    )
                    .await?;

                let anchor_tx_id = self
                    .ctx
                    .submit_anchor(
                        AnchorTransaction::new("document.keys_rotated").with_accrual(
                            serde_json::json!({
                                "document_id": document_id,
                                "rotations": rotated.iter().map(|(set, old, new)| {
                                    serde_json::json!({
                                        "content_set": set,
                                        "old_key_id": old,
                                        "new_key_id": new,
                                    })
                                }).collect::<Vec<_>>(),
                            }),
                        ),
                    )
                    .await;

                info!(
                    document_id = %document_id,
                    operation = operations::ROTATE_KEYS,
                    rotated = rotated.len(),
                    "keys rotated"
                );

                Ok(RotationOutcome {
                    document_id: document_id.clone(),
                    rotated,
                    anchor_tx_id,
                })
            }
            Err(e) => {
                warn!(
                    document_id = %document_id,
                    error = %e,
                    "key rotation failed; no rows were rewritten"
                );
                let _ = self
                    .ctx
                    .record_audit(
                        AuditEvent::new(
                            AuditCategory::Action,
                            "document.rotation_failed",
                            format!("key rotation failed: {}", e),
                            "document",
                            document_id.to_string(),
                            serde_json::json!({}),
                        )
                        .with_org(document.organization_id.clone()),
                    )
                    .await;
                Err(e)
            }
        }
    }
}
