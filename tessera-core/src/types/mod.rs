//! Core data model
//!
//! Entity types shared across the workspace. Ownership follows the data
//! model: a document exclusively owns its base document, its encrypted
//! content sets, and its key records; markers and envelopes are created
//! only by deconstruction, rewritten only by rotation, and removed only by
//! destruction.

pub mod assignment;
pub mod common;
pub mod document;
pub mod envelope;
pub mod event;
pub mod key;
pub mod marker;
pub mod profile;

pub use assignment::ApprovedAssignment;
pub use common::{ContentSetId, DocumentId, KeyHandle, KeyId, OrganizationId, Sha512Digest};
pub use document::{Document, DocumentStatus};
pub use envelope::{EncryptedContentSet, EncryptedEnvelope, AES_256_GCM};
pub use event::{
    AnchorReceipt, AnchorTransaction, AuditCategory, AuditEvent, ReconstructedBlock,
    ReconstructedView, ReconstructionEvent,
};
pub use key::{
    key_record_fingerprint, validate_shamir_params, EncryptionKeyRecord, KeyShareRecord,
    SHAMIR_MAX_SHARES, SHAMIR_MIN_THRESHOLD,
};
pub use marker::{BaseDocument, BaseMarkerEntry, PositionalMarker};
pub use profile::{
    AuthorizationProviderKind, IntegrityFailurePolicy, SecurityProfile, StorageTier,
    DEFAULT_MARKER_WIDTH, MAX_MARKER_WIDTH, MIN_MARKER_WIDTH, REDACTION_GLYPH,
};
