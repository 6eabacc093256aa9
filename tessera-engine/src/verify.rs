//! Integrity verification
//!
//! Read-only sweep over a document's stored artifacts: base-document
//! hash, per-set ciphertext hash, AEAD authentication, and plaintext
//! hash. Mutates nothing; reports everything.

use tracing::info;

use tessera_core::crypto;
use tessera_core::logging::operations;
use tessera_core::types::{
    AuditCategory, AuditEvent, ContentSetId, DocumentId, DocumentStatus,
};
use tessera_core::CoreError;

use crate::engine::TesseraEngine;
use crate::error::{EngineError, EngineResult};

/// Verification outcome for one content set
#[derive(Debug, Clone)]
pub struct ContentSetIntegrity {
    pub content_set_identifier: ContentSetId,
    /// Stored ciphertext hash matches the ciphertext bytes
    pub ciphertext_ok: bool,
    /// GCM authentication succeeded under the active key
    pub decrypt_ok: bool,
    /// Recovered plaintext matches the recorded plaintext hash
    pub plaintext_ok: bool,
}

impl ContentSetIntegrity {
    pub fn all_ok(&self) -> bool {
        self.ciphertext_ok && self.decrypt_ok && self.plaintext_ok
    }
}

/// Full integrity report for a document
#[derive(Debug)]
pub struct IntegrityReport {
    pub document_id: DocumentId,
    pub base_document_ok: bool,
    pub sets: Vec<ContentSetIntegrity>,
}

impl IntegrityReport {
    pub fn all_passed(&self) -> bool {
        self.base_document_ok && self.sets.iter().all(ContentSetIntegrity::all_ok)
    }
}

impl TesseraEngine {
    /// Verify every stored artifact of an active document.
    pub async fn verify_integrity(&self, document_id: &DocumentId) -> EngineResult<IntegrityReport> {
        let document = self.require_document(document_id).await?;
        if document.status != DocumentStatus::Active {
            return Err(EngineError::PreconditionViolation(format!(
                "document {} is {}, expected active",
                document_id, document.status
            )));
        }

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
        let base_document_ok = base.verify_content_hash();

        let mut sets = Vec::new();
        for row in self.ctx.content_sets.list_content_sets(document_id).await? {
            let set = row.content_set_identifier.clone();
            let ciphertext_ok = row.envelope.verify_ciphertext_hash();

            let (decrypt_ok, plaintext_ok) = if !ciphertext_ok {
                (false, false)
            } else {
                let key = self
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

                let outcome = {
                    let material = self.ctx.hsm_key_material(&key.hsm_key_handle).await?;
                    crypto::decrypt(&row.envelope, material.as_bytes())
                };
                match outcome {
                    Ok(_) => (true, true),
                    Err(CoreError::PlaintextIntegrityFailure(_)) => (true, false),
                    Err(CoreError::AeadAuthenticationFailure(_))
                    | Err(CoreError::CiphertextIntegrityFailure(_)) => (false, false),
                    Err(other) => return Err(other.into()),
                }
            };

            sets.push(ContentSetIntegrity {
                content_set_identifier: set,
                ciphertext_ok,
                decrypt_ok,
                plaintext_ok,
            });
        }

        let report = IntegrityReport {
            document_id: document_id.clone(),
            base_document_ok,
            sets,
        };

        self.ctx
            .record_audit(
                AuditEvent::new(
                    AuditCategory::Accrual,
                    "document.integrity_verified",
                    "stored artifacts verified",
                    "document",
                    document_id.to_string(),
                    serde_json::json!({
                        "base_document_ok": report.base_document_ok,
                        "set_count": report.sets.len(),
                        "all_passed": report.all_passed(),
                    }),
                )
                .with_org(document.organization_id.clone()),
            )
            .await?;

        info!(
            document_id = %document_id,
            operation = operations::VERIFY_INTEGRITY,
            all_passed = report.all_passed(),
            "integrity verification complete"
        );

        Ok(report)
    }
}
