//! Verified destruction engine
//!
//! Cryptographic destruction is terminal: envelopes, the base document and
//! share rows are deleted, HSM handles are destroyed, and key records are
//! deactivated with `destroyed_at` stamped. The audit trail is retained;
//! the content and all keys are gone. Targeted content-set destruction
//! (right to erasure) runs the same protocol scoped to one set, leaving
//! the rest of the document reconstructible.

use tracing::{info, warn};

use tessera_core::logging::operations;
use tessera_core::types::{
    AnchorTransaction, AuditCategory, AuditEvent, ContentSetId, Document, DocumentId,
    DocumentStatus, EncryptionKeyRecord, KeyHandle,
};
use tessera_store::{DestructionCommit, DestructionScope};

use crate::engine::TesseraEngine;
use crate::error::{EngineError, EngineResult};

/// Summary of a committed destruction
#[derive(Debug)]
pub struct DestructionOutcome {
    pub document_id: DocumentId,
    pub destroyed_key_count: usize,
    pub anchor_tx_id: Option<String>,
}

impl TesseraEngine {
    /// Destroy an entire document: `active -> destroying -> destroyed`.
    ///
    /// Preconditions: no active legal hold, retention window elapsed, and
    /// explicit regulatory clearance supplied by the caller.
    pub async fn destroy(
        &self,
        document_id: &DocumentId,
        reason: &str,
        regulatory_clearance: bool,
    ) -> EngineResult<DestructionOutcome> {
        let _lock = self.ctx.documents.lock_document(document_id).await?;

        let document = self.require_document(document_id).await?;
        self.check_destruction_preconditions(&document, regulatory_clearance)
            .await?;

        self.ctx
            .documents
            .update_status(document_id, DocumentStatus::Active, DocumentStatus::Destroying)
            .await?;

        let keys = match self.ctx.keys.list_keys_for_document(document_id).await {
            Ok(keys) => keys,
            Err(e) => {
                self.rewind_destroying(document_id).await;
                return Err(e.into());
            }
        };
        let handles: Vec<KeyHandle> = keys.iter().map(|k| k.hsm_key_handle.clone()).collect();
        let destroyed_keys: Vec<EncryptionKeyRecord> = keys
            .into_iter()
            .map(|mut k| {
                k.deactivate_destroyed();
                k
            })
            .collect();
        let destroyed_key_count = destroyed_keys.len();

        if let Err(e) = self
            .ctx
            .transactions
            .commit_destruction(DestructionCommit {
                document_id: document_id.clone(),
                scope: DestructionScope::Document,
                destroyed_keys,
            })
            .await
        {
            self.rewind_destroying(document_id).await;
            return Err(e.into());
        }

        // Rows are gone; HSM destruction is idempotent and best-effort on
        // handles that are already gone.
        for handle in &handles {
            self.ctx.hsm_destroy_key_best_effort(handle).await;
        }

        self.ctx
            .record_audit(
                AuditEvent::new(
                    AuditCategory::Action,
                    "document.destroyed",
                    format!("document cryptographically destroyed: {}", reason),
                    "document",
                    document_id.to_string(),
                    serde_json::json!({
                        "reason": reason,
                        "regulatory_clearance": regulatory_clearance,
                        "destroyed_key_count": destroyed_key_count,
                    }),
                )
                .with_org(document.organization_id.clone()),
            )
            .await?;

        let anchor_tx_id = self
            .ctx
            .submit_anchor(
                AnchorTransaction::new("document.destroyed").with_action(serde_json::json!({
                    "document_id": document_id,
                    "reason": reason,
                    "destroyed_key_count": destroyed_key_count,
                })),
            )
            .await;

        info!(
            document_id = %document_id,
            operation = operations::DESTROY,
            destroyed_key_count,
            "document destroyed"
        );

        Ok(DestructionOutcome {
            document_id: document_id.clone(),
            destroyed_key_count,
            anchor_tx_id,
        })
    }

    /// Destroy one content set (right to erasure). The document stays
    /// active and its other sets remain reconstructible.
    pub async fn destroy_content_set(
        &self,
        document_id: &DocumentId,
        set: &ContentSetId,
        reason: &str,
        regulatory_basis: &str,
    ) -> EngineResult<DestructionOutcome> {
        if regulatory_basis.trim().is_empty() {
            return Err(EngineError::PreconditionViolation(
                "content-set destruction requires a regulatory basis".into(),
            ));
        }

        let _lock = self.ctx.documents.lock_document(document_id).await?;

        let document = self.require_document(document_id).await?;
        if document.status != DocumentStatus::Active {
            return Err(EngineError::PreconditionViolation(format!(
                "document {} is {}, expected active",
                document_id, document.status
            )));
        }
        if self.ctx.legal_holds.has_active_hold(document_id).await? {
            return Err(EngineError::PreconditionViolation(format!(
                "document {} is under legal hold",
                document_id
            )));
        }
        if self
            .ctx
            .content_sets
            .get_content_set(document_id, set)
            .await?
            .is_none()
        {
            return Err(EngineError::PreconditionViolation(format!(
                "content set {} does not exist for document {}",
                set, document_id
            )));
        }

        let keys = self.ctx.keys.list_keys_for_document(document_id).await?;
        let set_keys: Vec<EncryptionKeyRecord> = keys
            .into_iter()
            .filter(|k| &k.content_set_identifier == set)
            .collect();
        let handles: Vec<KeyHandle> = set_keys.iter().map(|k| k.hsm_key_handle.clone()).collect();
        let destroyed_keys: Vec<EncryptionKeyRecord> = set_keys
            .into_iter()
            .map(|mut k| {
                k.deactivate_destroyed();
                k
            })
            .collect();
        let destroyed_key_count = destroyed_keys.len();

        self.ctx
            .transactions
            .commit_destruction(DestructionCommit {
                document_id: document_id.clone(),
                scope: DestructionScope::ContentSet(set.clone()),
                destroyed_keys,
            })
            .await?;

        for handle in &handles {
            self.ctx.hsm_destroy_key_best_effort(handle).await;
        }

        self.ctx
            .record_audit(
                AuditEvent::new(
                    AuditCategory::Action,
                    "document.content_set_destroyed",
                    format!("content set {} destroyed: {}", set, reason),
                    "document",
                    document_id.to_string(),
                    serde_json::json!({
                        "content_set": set,
                        "reason": reason,
                        "regulatory_basis": regulatory_basis,
                    }),
                )
                .with_org(document.organization_id.clone()),
            )
            .await?;

        let anchor_tx_id = self
            .ctx
            .submit_anchor(
                AnchorTransaction::new("document.content_set_destroyed").with_action(
                    serde_json::json!({
                        "document_id": document_id,
                        "content_set": set,
                        "regulatory_basis": regulatory_basis,
                    }),
                ),
            )
            .await;

        info!(
            document_id = %document_id,
            content_set = %set,
            operation = operations::DESTROY_CONTENT_SET,
            "content set destroyed"
        );

        Ok(DestructionOutcome {
            document_id: document_id.clone(),
            destroyed_key_count,
            anchor_tx_id,
        })
    }

    async fn check_destruction_preconditions(
        &self,
        document: &Document,
        regulatory_clearance: bool,
    ) -> EngineResult<()> {
        if document.status != DocumentStatus::Active {
            return Err(EngineError::PreconditionViolation(format!(
                "document {} is {}, expected active",
                document.id, document.status
            )));
        }
        if !regulatory_clearance {
            return Err(EngineError::PreconditionViolation(
                "destruction requires explicit regulatory clearance".into(),
            ));
        }
        if self.ctx.legal_holds.has_active_hold(&document.id).await? {
            return Err(EngineError::PreconditionViolation(format!(
                "document {} is under legal hold",
                document.id
            )));
        }
        if !document.retention_elapsed() {
            return Err(EngineError::PreconditionViolation(format!(
                "document {} is inside its retention window",
                document.id
            )));
        }
        Ok(())
    }

    async fn rewind_destroying(&self, document_id: &DocumentId) {
        if let Err(e) = self
            .ctx
            .documents
            .update_status(document_id, DocumentStatus::Destroying, DocumentStatus::Active)
            .await
        {
            warn!(
                document_id = %document_id,
                error = %e,
                "status rewind after failed destruction also failed"
            );
        }
    }
}
