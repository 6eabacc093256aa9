//! Engine context
//!
//! Dependencies are threaded through this context rather than reached via
//! ambient globals: every store trait, the HSM provider, the audit and
//! anchor sinks, and the tenant's authorization provider. Construction
//! validates configuration; dropping the context releases everything.
//!
//! HSM calls observe the context's operation timeout; expiry maps to the
//! retryable HSM-unavailable error and the surrounding transaction rolls
//! back.

use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use tessera_core::logging::operations;
use tessera_core::types::{AnchorTransaction, AuditEvent, KeyHandle, KeyId};
use tessera_hsm::{HolderShare, HsmProvider, KeyMaterial};
use tessera_store::{
    AnchorSink, AssignmentStore, AuditSink, BaseDocumentStore, ContentSetStore, DocumentStore,
    KeyRecordStore, LegalHoldStore, MemoryStore, ReconstructionEventStore, SecurityProfileStore,
    ShareStore, TransactionStore,
};

use crate::authorization::AuthorizationProvider;
use crate::error::{EngineError, EngineResult};

/// Default per-call deadline for HSM operations
pub const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything an engine operation needs, wired once at startup
pub struct EngineContext {
    pub documents: Arc<dyn DocumentStore>,
    pub assignments: Arc<dyn AssignmentStore>,
    pub content_sets: Arc<dyn ContentSetStore>,
    pub keys: Arc<dyn KeyRecordStore>,
    pub shares: Arc<dyn ShareStore>,
    pub base_documents: Arc<dyn BaseDocumentStore>,
    pub reconstructions: Arc<dyn ReconstructionEventStore>,
    pub profiles: Arc<dyn SecurityProfileStore>,
    pub legal_holds: Arc<dyn LegalHoldStore>,
    pub transactions: Arc<dyn TransactionStore>,
    pub audit: Arc<dyn AuditSink>,
    pub anchor: Arc<dyn AnchorSink>,
    pub hsm: Arc<dyn HsmProvider>,
    pub authorization: Arc<dyn AuthorizationProvider>,
    pub op_timeout: Duration,
}

impl EngineContext {
    /// Wire every store trait to one backing store. The common shape for
    /// development and tests; production deployments compose stores
    /// individually.
    pub fn for_memory_store(
        store: Arc<MemoryStore>,
        audit: Arc<dyn AuditSink>,
        anchor: Arc<dyn AnchorSink>,
        hsm: Arc<dyn HsmProvider>,
        authorization: Arc<dyn AuthorizationProvider>,
    ) -> Self {
        Self {
            documents: store.clone(),
            assignments: store.clone(),
            content_sets: store.clone(),
            keys: store.clone(),
            shares: store.clone(),
            base_documents: store.clone(),
            reconstructions: store.clone(),
            profiles: store.clone(),
            legal_holds: store.clone(),
            transactions: store,
            audit,
            anchor,
            hsm,
            authorization,
            op_timeout: DEFAULT_OP_TIMEOUT,
        }
    }

    pub fn with_op_timeout(mut self, timeout: Duration) -> Self {
        self.op_timeout = timeout;
        self
    }

    pub(crate) async fn hsm_generate_key(&self) -> EngineResult<(KeyHandle, KeyId)> {
        tokio::time::timeout(self.op_timeout, self.hsm.generate_key())
            .await
            .map_err(|_| EngineError::HsmUnavailable("generate_key timed out".into()))?
            .map_err(EngineError::from)
    }

    pub(crate) async fn hsm_key_material(&self, handle: &KeyHandle) -> EngineResult<KeyMaterial> {
        tokio::time::timeout(self.op_timeout, self.hsm.get_key_material(handle))
            .await
            .map_err(|_| EngineError::HsmUnavailable("get_key_material timed out".into()))?
            .map_err(EngineError::from)
    }

    pub(crate) async fn hsm_split_key(
        &self,
        handle: &KeyHandle,
        threshold: u8,
        holder_ids: &[String],
    ) -> EngineResult<Vec<HolderShare>> {
        tokio::time::timeout(
            self.op_timeout,
            self.hsm.split_key_to_shares(handle, threshold, holder_ids),
        )
        .await
        .map_err(|_| EngineError::HsmUnavailable("split_key_to_shares timed out".into()))?
        .map_err(EngineError::from)
    }

    /// Best-effort HSM key destruction; failures are logged, not raised.
    /// Destruction commits have already landed by the time this runs, and
    /// `destroy_key` is idempotent, so a retry can finish the job.
    pub(crate) async fn hsm_destroy_key_best_effort(&self, handle: &KeyHandle) {
        let result = tokio::time::timeout(self.op_timeout, self.hsm.destroy_key(handle)).await;
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(
                error = %e,
                operation = operations::KEY_DESTROY,
                "HSM key destruction failed; retry required"
            ),
            Err(_) => warn!(
                operation = operations::KEY_DESTROY,
                "HSM key destruction timed out; retry required"
            ),
        }
    }

    /// Record one audit event, surfacing sink failures to the caller
    pub(crate) async fn record_audit(&self, event: AuditEvent) -> EngineResult<String> {
        Ok(self.audit.record(event).await?)
    }

    /// Submit one anchor transaction. Unreachability is a warning, never
    /// a fault: persistence has already committed and the sink owns retry.
    pub(crate) async fn submit_anchor(&self, transaction: AnchorTransaction) -> Option<String> {
        match self.anchor.submit(transaction).await {
            Ok(receipt) => Some(receipt.forward_tx_id),
            Err(e) => {
                warn!(
                    error = %e,
                    operation = operations::ANCHOR_SUBMIT,
                    "anchor sink unreachable; event remains unanchored"
                );
                None
            }
        }
    }
}
