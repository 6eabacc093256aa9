//! Encryption key records and share metadata
//!
//! Key records never contain key material; they reference the HSM through
//! an opaque handle. Rotation chains records through `rotated_from_key_id`
//! (new row references old id, old row is never mutated to point back, so
//! chains cannot cycle).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::common::{ContentSetId, DocumentId, KeyHandle, KeyId, OrganizationId, Sha512Digest};
use crate::error::{CoreError, CoreResult};

/// Inclusive Shamir parameter bounds: `2 <= M <= N <= 254`
pub const SHAMIR_MIN_THRESHOLD: u8 = 2;
pub const SHAMIR_MAX_SHARES: u8 = 254;

/// Validate a `(threshold, total_shares)` pair
pub fn validate_shamir_params(threshold: u8, total_shares: u8) -> CoreResult<()> {
    if threshold < SHAMIR_MIN_THRESHOLD || threshold > total_shares || total_shares > SHAMIR_MAX_SHARES
    {
        return Err(CoreError::Validation(format!(
            "invalid Shamir parameters: M={}, N={} (require 2 <= M <= N <= 254)",
            threshold, total_shares
        )));
    }
    Ok(())
}

/// Persisted encryption key record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptionKeyRecord {
    pub id: KeyId,
    pub document_id: DocumentId,
    pub content_set_identifier: ContentSetId,
    pub organization_id: OrganizationId,
    /// Opaque HSM handle; the only reference to key material
    pub hsm_key_handle: KeyHandle,
    pub algorithm: String,
    pub shamir_threshold: u8,
    pub shamir_total_shares: u8,
    /// At most one active record exists per (document, content set)
    pub is_active: bool,
    /// Predecessor in the rotation chain
    pub rotated_from_key_id: Option<KeyId>,
    pub created_at: DateTime<Utc>,
    pub rotated_at: Option<DateTime<Utc>>,
    pub destroyed_at: Option<DateTime<Utc>>,
}

impl EncryptionKeyRecord {
    /// Create a fresh active record around an HSM-issued `(id, handle)` pair
    pub fn new(
        id: KeyId,
        document_id: DocumentId,
        content_set_identifier: ContentSetId,
        organization_id: OrganizationId,
        hsm_key_handle: KeyHandle,
        algorithm: impl Into<String>,
        shamir_threshold: u8,
        shamir_total_shares: u8,
    ) -> CoreResult<Self> {
        validate_shamir_params(shamir_threshold, shamir_total_shares)?;
        Ok(Self {
            id,
            document_id,
            content_set_identifier,
            organization_id,
            hsm_key_handle,
            algorithm: algorithm.into(),
            shamir_threshold,
            shamir_total_shares,
            is_active: true,
            rotated_from_key_id: None,
            created_at: Utc::now(),
            rotated_at: None,
            destroyed_at: None,
        })
    }

    /// Derive the successor record for a rotation, inheriting (M, N)
    pub fn rotated_successor(&self, new_id: KeyId, new_handle: KeyHandle) -> Self {
        Self {
            id: new_id,
            document_id: self.document_id.clone(),
            content_set_identifier: self.content_set_identifier.clone(),
            organization_id: self.organization_id.clone(),
            hsm_key_handle: new_handle,
            algorithm: self.algorithm.clone(),
            shamir_threshold: self.shamir_threshold,
            shamir_total_shares: self.shamir_total_shares,
            is_active: true,
            rotated_from_key_id: Some(self.id.clone()),
            created_at: Utc::now(),
            rotated_at: None,
            destroyed_at: None,
        }
    }

    /// Deactivate as the predecessor of a rotation
    pub fn deactivate_rotated(&mut self) {
        self.is_active = false;
        self.rotated_at = Some(Utc::now());
    }

    /// Deactivate as part of verified destruction
    pub fn deactivate_destroyed(&mut self) {
        self.is_active = false;
        self.destroyed_at = Some(Utc::now());
    }
}

/// Share custody metadata. Share *data* is caller-owned after a split;
/// only holder metadata is persisted. Index 0 is reserved for the secret
/// itself and never appears here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyShareRecord {
    pub key_id: KeyId,
    /// Share index in [1, N]
    pub share_index: u8,
    /// Opaque holder identifier supplied by the tenant
    pub holder_id: String,
    pub distributed: bool,
    pub distributed_at: Option<DateTime<Utc>>,
}

impl KeyShareRecord {
    pub fn new(key_id: KeyId, share_index: u8, holder_id: impl Into<String>) -> Self {
        Self {
            key_id,
            share_index,
            holder_id: holder_id.into(),
            distributed: false,
            distributed_at: None,
        }
    }

    /// Mark the share as handed to its holder
    pub fn mark_distributed(&mut self) {
        self.distributed = true;
        self.distributed_at = Some(Utc::now());
    }
}

/// Digest of a key record for anchor accrual payloads (no handle, no
/// share custody detail)
pub fn key_record_fingerprint(record: &EncryptionKeyRecord) -> Sha512Digest {
    let material = format!(
        "{}|{}|{}|{}|{}",
        record.id,
        record.document_id,
        record.content_set_identifier,
        record.shamir_threshold,
        record.shamir_total_shares
    );
    Sha512Digest::compute(material.as_bytes())
}
