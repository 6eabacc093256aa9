//! Tessera Core - Document Confidentiality Primitives
//!
//! Tessera deconstructs an approved document into independently encrypted
//! content sets stored in separated locations, and reconstructs a tailored
//! view per viewer in which unauthorized content is replaced by opaque,
//! fixed-width redaction markers. The structural guarantee: no single
//! party, operators included, can unilaterally obtain a complete document.
//!
//! This crate holds the pieces everything else builds on:
//!
//! - The data model: documents and their lifecycle state machine,
//!   assignments, positional markers, envelopes, key records, share
//!   metadata, audit/anchor event shapes ([`types`])
//! - Symmetric crypto: AES-256-GCM with AAD set binding, HKDF-SHA-512,
//!   SHA-512 digests ([`crypto`])
//! - GF(256) arithmetic and Shamir's Secret Sharing ([`crypto::shamir`])
//! - The marker builder and payload codecs ([`markers`])
//!
//! # Hard invariants
//!
//! 1. **Marker opacity**: the base document serialization reveals, per
//!    marker, only identity, position, and document order
//! 2. **AAD binding**: every envelope authenticates its content-set
//!    identity; substitution between sets fails decryption
//! 3. **Lifecycle**: `deconstructing` is always left via exactly one of
//!    `active` (commit) or `approved` (rollback); `destroyed` is terminal
//! 4. **No key material at rest**: persisted records reference keys only
//!    through opaque HSM handles

pub mod crypto;
pub mod error;
pub mod logging;
pub mod markers;
pub mod types;

pub use error::{CoreError, CoreResult};

pub use types::{
    ApprovedAssignment, BaseDocument, ContentSetId, Document, DocumentId, DocumentStatus,
    EncryptedContentSet, EncryptedEnvelope, EncryptionKeyRecord, KeyHandle, KeyId, KeyShareRecord,
    OrganizationId, PositionalMarker, ReconstructedView, ReconstructionEvent, SecurityProfile,
    Sha512Digest,
};

pub use crypto::ShamirShare;
pub use markers::{build_markers, MarkerBuildOutput};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
