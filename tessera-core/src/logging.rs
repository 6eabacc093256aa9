//! Logging conventions
//!
//! Structured-field and operation-name constants shared across the
//! workspace so log output stays greppable. Always prefer structured
//! fields over interpolated messages:
//!
//! ```ignore
//! use tracing::info;
//!
//! info!(
//!     document_id = %doc.id,
//!     operation = operations::DECONSTRUCT,
//!     content_sets = set_count,
//!     "document deconstructed"
//! );
//! ```
//!
//! Key material, share data, and plaintext content are never logged at
//! any level.

/// Standard structured log field names
pub mod fields {
    pub const DOCUMENT_ID: &str = "document_id";
    pub const ORGANIZATION_ID: &str = "organization_id";
    pub const CONTENT_SET: &str = "content_set";
    pub const KEY_ID: &str = "key_id";
    pub const VIEWER_ID: &str = "viewer_id";
    pub const ACCESS_LEVEL_ID: &str = "access_level_id";
    pub const OPERATION: &str = "operation";
    pub const ERROR: &str = "error";
    pub const MARKER_COUNT: &str = "marker_count";
    pub const STAGE: &str = "stage";
    pub const ANCHOR_TX_ID: &str = "anchor_tx_id";
}

/// Operation names for consistent logging
pub mod operations {
    pub const DECONSTRUCT: &str = "deconstruct";
    pub const RECONSTRUCT: &str = "reconstruct";
    pub const ROTATE_KEYS: &str = "rotate_keys";
    pub const DESTROY: &str = "destroy";
    pub const DESTROY_CONTENT_SET: &str = "destroy_content_set";
    pub const VERIFY_INTEGRITY: &str = "verify_integrity";
    pub const KEY_GENERATE: &str = "key_generate";
    pub const KEY_DESTROY: &str = "key_destroy";
    pub const SHARE_SPLIT: &str = "share_split";
    pub const AUDIT_RECORD: &str = "audit_record";
    pub const ANCHOR_SUBMIT: &str = "anchor_submit";
}
