//! Encrypted envelope record
//!
//! One envelope exists per `(document, content_set_identifier)`. The
//! envelope is a structured record with explicit fields, not an untyped
//! blob: the storage layer may persist it opaquely but its schema is owned
//! here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::common::{ContentSetId, DocumentId, KeyId, Sha512Digest};

/// Algorithm identifier carried by every envelope
pub const AES_256_GCM: &str = "aes-256-gcm";

/// AES-256-GCM envelope with detached authentication tag
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedEnvelope {
    /// The content set this ciphertext belongs to; its UTF-8 bytes were
    /// the AAD during encryption, so envelope substitution between sets
    /// fails authentication.
    pub content_set_identifier: ContentSetId,
    /// Fresh random 12-byte IV
    pub iv: Vec<u8>,
    /// 16-byte GCM tag
    pub auth_tag: Vec<u8>,
    pub ciphertext: Vec<u8>,
    /// SHA-512 of the pre-encryption plaintext
    pub plaintext_hash: Sha512Digest,
    /// SHA-512 of the ciphertext bytes
    pub ciphertext_hash: Sha512Digest,
    /// Key record that encrypted this envelope
    pub key_id: KeyId,
    /// Always `"aes-256-gcm"`
    pub algorithm: String,
    pub encrypted_at: DateTime<Utc>,
}

impl EncryptedEnvelope {
    /// Recompute the ciphertext hash and compare to the stored one
    pub fn verify_ciphertext_hash(&self) -> bool {
        Sha512Digest::compute(&self.ciphertext) == self.ciphertext_hash
    }
}

/// Persisted row holding an envelope and its storage placement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedContentSet {
    pub document_id: DocumentId,
    pub content_set_identifier: ContentSetId,
    pub envelope: EncryptedEnvelope,
    /// Opaque storage-location identifier, scoped by the tenant's
    /// storage tier
    pub storage_ref: String,
    pub key_id: KeyId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
