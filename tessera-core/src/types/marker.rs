//! Positional markers and the base document
//!
//! A marker is the opaque artifact left in the base document where content
//! was extracted. Markers reveal neither the length nor the type nor the
//! nature of what they replaced; two extraction points with the same
//! positional key collapse into one merged marker so counts cannot be
//! used for inference.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::common::{ContentSetId, DocumentId, Sha512Digest};

/// Opaque positional marker placed in the base document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionalMarker {
    /// Marker identity
    pub marker_id: Uuid,
    /// Content sets the extracted content belongs to, in first-seen order,
    /// deduplicated. Never serialized into the base document.
    pub content_set_membership: Vec<ContentSetId>,
    /// Source block
    pub block_id: String,
    pub start_offset: Option<u32>,
    pub end_offset: Option<u32>,
    /// SHA-512 of the exact original extracted text; used to detect
    /// post-decryption tampering during reconstruction
    pub content_hash: Sha512Digest,
    /// Position in document order, starting at 1
    pub sequence_position: u32,
    /// True when two or more assignments at the same positional key
    /// collapsed into this marker
    pub is_merged: bool,
}

impl PositionalMarker {
    /// Whether the marker's content belongs to the given set
    pub fn is_member_of(&self, set: &ContentSetId) -> bool {
        self.content_set_membership.contains(set)
    }
}

/// Entry in the serialized base document.
///
/// This is the full extent of what the base document reveals per marker:
/// identity, position, and document order. No membership, no length, no
/// content type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseMarkerEntry {
    pub marker_id: Uuid,
    pub block_id: String,
    pub start_offset: Option<u32>,
    pub end_offset: Option<u32>,
    pub sequence_position: u32,
}

impl From<&PositionalMarker> for BaseMarkerEntry {
    fn from(marker: &PositionalMarker) -> Self {
        Self {
            marker_id: marker.marker_id,
            block_id: marker.block_id.clone(),
            start_offset: marker.start_offset,
            end_offset: marker.end_offset,
            sequence_position: marker.sequence_position,
        }
    }
}

/// The post-deconstruction artifact: a serialized opaque marker list and
/// the full marker records needed for reconstruction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseDocument {
    pub document_id: DocumentId,
    /// Serialized `BaseMarkerEntry` list (canonical JSON)
    pub content: String,
    /// SHA-512 of `content`
    pub content_hash: Sha512Digest,
    /// Full markers, including membership. Stored alongside the base
    /// document but never part of the hashed opaque serialization.
    pub markers: Vec<PositionalMarker>,
    pub created_at: DateTime<Utc>,
}

impl BaseDocument {
    /// Recompute the content hash and compare against the stored one
    pub fn verify_content_hash(&self) -> bool {
        Sha512Digest::compute(self.content.as_bytes()) == self.content_hash
    }
}
