//! Persistence trait catalogue
//!
//! Async traits over the persisted state layout: documents, the approved
//! assignment store fed by the markup collaborator, envelopes, key and
//! share records, base documents, reconstruction events, grants, access
//! levels, security profiles, and legal holds.
//!
//! Writes produced by an engine transaction go through the composite
//! commit methods on [`TransactionStore`]; implementations must apply a
//! commit atomically so partial persistence is never visible.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::OwnedMutexGuard;

use tessera_core::types::{
    ApprovedAssignment, BaseDocument, ContentSetId, Document, DocumentId, DocumentStatus,
    EncryptedContentSet, EncryptionKeyRecord, KeyId, KeyShareRecord, OrganizationId,
    ReconstructionEvent, SecurityProfile,
};

use crate::error::StoreResult;

/// Exclusive row-level lock on one document. Held for the span of a
/// deconstruction, rotation, or destruction; dropped on every exit path.
pub struct DocumentLock {
    _guard: OwnedMutexGuard<()>,
    document_id: DocumentId,
}

impl DocumentLock {
    pub fn new(guard: OwnedMutexGuard<()>, document_id: DocumentId) -> Self {
        Self {
            _guard: guard,
            document_id,
        }
    }

    pub fn document_id(&self) -> &DocumentId {
        &self.document_id
    }
}

impl std::fmt::Debug for DocumentLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DocumentLock({})", self.document_id)
    }
}

/// Document rows and their lifecycle status
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert_document(&self, document: Document) -> StoreResult<()>;

    async fn get_document(&self, id: &DocumentId) -> StoreResult<Option<Document>>;

    /// Acquire the row-level lock for a document. Concurrent engine
    /// operations on the same document serialize here.
    async fn lock_document(&self, id: &DocumentId) -> StoreResult<DocumentLock>;

    /// Compare-and-set the lifecycle status. Fails with a conflict when
    /// the stored status does not equal `from`.
    async fn update_status(
        &self,
        id: &DocumentId,
        from: DocumentStatus,
        to: DocumentStatus,
    ) -> StoreResult<()>;
}

/// Approved assignment sets, written by the markup collaborator and read
/// by deconstruction under the document lock
#[async_trait]
pub trait AssignmentStore: Send + Sync {
    async fn put_approved_set(
        &self,
        document_id: &DocumentId,
        session_id: &str,
        assignments: Vec<ApprovedAssignment>,
    ) -> StoreResult<()>;

    async fn load_approved_set(
        &self,
        document_id: &DocumentId,
        session_id: &str,
    ) -> StoreResult<Option<Vec<ApprovedAssignment>>>;
}

/// Encrypted content-set rows (reads; writes go through commits)
#[async_trait]
pub trait ContentSetStore: Send + Sync {
    async fn get_content_set(
        &self,
        document_id: &DocumentId,
        set: &ContentSetId,
    ) -> StoreResult<Option<EncryptedContentSet>>;

    async fn list_content_sets(&self, document_id: &DocumentId)
        -> StoreResult<Vec<EncryptedContentSet>>;
}

/// Encryption key records
#[async_trait]
pub trait KeyRecordStore: Send + Sync {
    async fn get_key(&self, id: &KeyId) -> StoreResult<Option<EncryptionKeyRecord>>;

    /// The single active record for a (document, content set), if any
    async fn active_key_for(
        &self,
        document_id: &DocumentId,
        set: &ContentSetId,
    ) -> StoreResult<Option<EncryptionKeyRecord>>;

    async fn list_keys_for_document(
        &self,
        document_id: &DocumentId,
    ) -> StoreResult<Vec<EncryptionKeyRecord>>;
}

/// Key share custody metadata
#[async_trait]
pub trait ShareStore: Send + Sync {
    async fn list_shares_for_key(&self, key_id: &KeyId) -> StoreResult<Vec<KeyShareRecord>>;

    /// Flag one share as handed to its holder
    async fn mark_share_distributed(&self, key_id: &KeyId, share_index: u8) -> StoreResult<()>;
}

/// Base documents
#[async_trait]
pub trait BaseDocumentStore: Send + Sync {
    async fn get_base_document(&self, document_id: &DocumentId)
        -> StoreResult<Option<BaseDocument>>;
}

/// Append-only reconstruction event records
#[async_trait]
pub trait ReconstructionEventStore: Send + Sync {
    async fn record_reconstruction(&self, event: ReconstructionEvent) -> StoreResult<()>;

    async fn list_reconstructions(
        &self,
        document_id: &DocumentId,
    ) -> StoreResult<Vec<ReconstructionEvent>>;
}

/// A viewer's grant of an access level on a document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessGrant {
    pub user_id: String,
    pub document_id: DocumentId,
    pub access_level_id: String,
    pub organization_id: OrganizationId,
    pub granted_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl AccessGrant {
    /// Active, non-revoked, non-expired
    pub fn is_usable(&self) -> bool {
        self.revoked_at.is_none()
            && self.expires_at.map(|t| t > Utc::now()).unwrap_or(true)
    }

    /// Whether the grant has expired (as opposed to being revoked)
    pub fn is_expired(&self) -> bool {
        self.expires_at.map(|t| t <= Utc::now()).unwrap_or(false)
    }
}

/// Grants table consulted by the conventional authorization provider
#[async_trait]
pub trait GrantStore: Send + Sync {
    async fn put_grant(&self, grant: AccessGrant) -> StoreResult<()>;

    async fn find_grant(
        &self,
        user_id: &str,
        document_id: &DocumentId,
        access_level_id: &str,
        organization_id: &OrganizationId,
    ) -> StoreResult<Option<AccessGrant>>;
}

/// An access level: a non-hierarchical set of content-set identifiers
/// within an organization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessLevel {
    pub organization_id: OrganizationId,
    pub access_level_id: String,
    pub content_sets: Vec<ContentSetId>,
    pub is_active: bool,
}

/// Access level -> content set mapping
#[async_trait]
pub trait AccessLevelStore: Send + Sync {
    async fn put_access_level(&self, level: AccessLevel) -> StoreResult<()>;

    async fn get_access_level(
        &self,
        organization_id: &OrganizationId,
        access_level_id: &str,
    ) -> StoreResult<Option<AccessLevel>>;
}

/// Per-tenant security profiles
#[async_trait]
pub trait SecurityProfileStore: Send + Sync {
    async fn put_profile(&self, profile: SecurityProfile) -> StoreResult<()>;

    async fn get_profile(
        &self,
        organization_id: &OrganizationId,
    ) -> StoreResult<Option<SecurityProfile>>;
}

/// A hold preventing destruction regardless of retention
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegalHold {
    pub hold_id: String,
    pub document_id: DocumentId,
    pub case_ref: String,
    pub applied_at: DateTime<Utc>,
    pub released_at: Option<DateTime<Utc>>,
}

impl LegalHold {
    pub fn is_active(&self) -> bool {
        self.released_at.is_none()
    }
}

/// Legal hold registry, checked by verified destruction
#[async_trait]
pub trait LegalHoldStore: Send + Sync {
    async fn place_hold(&self, hold: LegalHold) -> StoreResult<()>;

    async fn release_hold(&self, hold_id: &str) -> StoreResult<()>;

    async fn has_active_hold(&self, document_id: &DocumentId) -> StoreResult<bool>;
}

/// All writes of a successful deconstruction, applied atomically together
/// with the `deconstructing -> active` transition
#[derive(Debug)]
pub struct DeconstructionCommit {
    pub document_id: DocumentId,
    pub base_document: BaseDocument,
    pub content_sets: Vec<EncryptedContentSet>,
    pub key_records: Vec<EncryptionKeyRecord>,
    pub share_records: Vec<KeyShareRecord>,
}

/// All writes of a successful rotation
#[derive(Debug)]
pub struct RotationCommit {
    pub document_id: DocumentId,
    /// Predecessor rows with `is_active = false, rotated_at` set
    pub deactivated_keys: Vec<EncryptionKeyRecord>,
    /// Successor rows, active, chained via `rotated_from_key_id`
    pub new_keys: Vec<EncryptionKeyRecord>,
    pub new_shares: Vec<KeyShareRecord>,
    /// Content-set rows carrying the re-encrypted envelopes
    pub updated_content_sets: Vec<EncryptedContentSet>,
}

/// All deletions of a verified destruction, applied atomically together
/// with the `destroying -> destroyed` transition. `content_sets = None`
/// destroys the whole document; `Some(set)` scopes to one content set
/// without a status transition.
#[derive(Debug)]
pub struct DestructionCommit {
    pub document_id: DocumentId,
    pub scope: DestructionScope,
    /// Key rows to deactivate with `destroyed_at` set
    pub destroyed_keys: Vec<EncryptionKeyRecord>,
}

/// Scope of a destruction commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DestructionScope {
    /// Whole document: all envelopes, the base document, all shares;
    /// transitions `destroying -> destroyed`
    Document,
    /// One content set: its envelope and its keys' shares; no status
    /// transition, the document stays active
    ContentSet(ContentSetId),
}

/// Atomic multi-row commits. The memory implementation applies each
/// commit under one write guard; a database implementation maps them to
/// transactions.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn commit_deconstruction(&self, commit: DeconstructionCommit) -> StoreResult<()>;

    async fn commit_rotation(&self, commit: RotationCommit) -> StoreResult<()>;

    async fn commit_destruction(&self, commit: DestructionCommit) -> StoreResult<()>;
}
