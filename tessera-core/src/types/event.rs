//! Audit events, anchor transactions, and reconstruction records
//!
//! Every success or failure of the deconstruction, reconstruction,
//! rotation and destruction engines emits exactly one audit event; the
//! audit sink guarantees append-only storage. Anchor transactions mirror
//! significant events to an external chain and are best-effort from the
//! core's point of view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::common::{ContentSetId, DocumentId, OrganizationId, Sha512Digest};

/// Audit event category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditCategory {
    /// Configuration and setup facts (keys generated, shares arranged)
    Arrangement,
    /// Verifiable outcomes (hashes, counts, confirmations)
    Accrual,
    /// Declared intentions (scheduled destruction)
    Anticipation,
    /// Things that happened (reconstructed, denied, destroyed)
    Action,
}

/// Opaque event accepted by the audit sink. Never contains secrets or
/// key material.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub category: AuditCategory,
    /// e.g. `document.deconstructed`, `reconstruction.denied`
    pub event_type: String,
    pub description: String,
    pub org_id: Option<OrganizationId>,
    pub actor_id: Option<String>,
    pub target_type: String,
    pub target_id: String,
    pub metadata: serde_json::Value,
    /// SHA-512 over the event body, computed at construction
    pub event_hash: Sha512Digest,
    pub recorded_at: DateTime<Utc>,
}

impl AuditEvent {
    /// Build an event, stamping `event_hash` over the canonical body
    pub fn new(
        category: AuditCategory,
        event_type: impl Into<String>,
        description: impl Into<String>,
        target_type: impl Into<String>,
        target_id: impl Into<String>,
        metadata: serde_json::Value,
    ) -> Self {
        let event_type = event_type.into();
        let description = description.into();
        let target_type = target_type.into();
        let target_id = target_id.into();
        let body = format!(
            "{}|{}|{}|{}|{}",
            event_type, description, target_type, target_id, metadata
        );
        Self {
            category,
            event_type,
            description,
            org_id: None,
            actor_id: None,
            target_type,
            target_id,
            metadata,
            event_hash: Sha512Digest::compute(body.as_bytes()),
            recorded_at: Utc::now(),
        }
    }

    pub fn with_org(mut self, org_id: OrganizationId) -> Self {
        self.org_id = Some(org_id);
        self
    }

    pub fn with_actor(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }
}

/// Transaction submitted to the anchor sink
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnchorTransaction {
    pub transaction_id: String,
    /// e.g. `document.deconstructed`, `document.destroyed`
    pub transaction_type: String,
    pub arrangement: Option<serde_json::Value>,
    pub accrual: Option<serde_json::Value>,
    pub anticipation: Option<serde_json::Value>,
    pub action: Option<serde_json::Value>,
}

impl AnchorTransaction {
    pub fn new(transaction_type: impl Into<String>) -> Self {
        Self {
            transaction_id: format!("anchor:{}", Uuid::new_v4()),
            transaction_type: transaction_type.into(),
            arrangement: None,
            accrual: None,
            anticipation: None,
            action: None,
        }
    }

    pub fn with_arrangement(mut self, value: serde_json::Value) -> Self {
        self.arrangement = Some(value);
        self
    }

    pub fn with_accrual(mut self, value: serde_json::Value) -> Self {
        self.accrual = Some(value);
        self
    }

    pub fn with_action(mut self, value: serde_json::Value) -> Self {
        self.action = Some(value);
        self
    }
}

/// Receipt returned by the anchor sink
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnchorReceipt {
    pub forward_tx_id: String,
    pub external_tx_id: Option<String>,
}

/// Append-only record of one reconstruction attempt, successful or refused
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconstructionEvent {
    pub id: Uuid,
    pub document_id: DocumentId,
    pub viewer_id: String,
    pub access_level_id: String,
    pub content_sets_used: Vec<ContentSetId>,
    pub content_sets_redacted: Vec<ContentSetId>,
    pub marker_width: u8,
    pub reconstruction_hash: Sha512Digest,
    /// Base document verified AND every authorized set verified
    pub integrity_all_passed: bool,
    pub anchor_tx_id: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// One block of a reconstructed view: either revealed content or the
/// uniform-width redaction marker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconstructedBlock {
    pub marker_id: Uuid,
    pub block_id: String,
    pub content: String,
    pub is_redacted: bool,
    /// The authorized set the content was read from, when revealed
    pub accessed_via_set: Option<ContentSetId>,
}

/// A viewer-tailored reconstruction of a document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconstructedView {
    pub document_id: DocumentId,
    pub viewer_id: String,
    pub blocks: Vec<ReconstructedBlock>,
    pub marker_width: u8,
    pub reconstruction_hash: Sha512Digest,
    pub integrity_all_passed: bool,
}
