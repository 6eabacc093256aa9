//! Tessera Store - Persistence Layer
//!
//! Async trait catalogue over the persisted state layout (documents,
//! envelopes, keys, shares, base documents, reconstruction events,
//! grants, access levels, profiles, legal holds), the append-only audit
//! sink, and the anchor sink, plus thread-safe in-memory implementations
//! for development and tests.
//!
//! # Transaction boundary
//!
//! Engine operations stage their writes and apply them through the
//! composite commit methods on [`TransactionStore`]; an implementation
//! must make each commit atomic so no partial persistence is ever
//! visible. The in-memory store holds all tables behind one lock for
//! exactly that reason.

pub mod anchor;
pub mod audit;
pub mod error;
pub mod memory;
pub mod traits;

pub use anchor::{AnchorSink, MemoryAnchorSink};
pub use audit::{AuditSink, MemoryAuditSink};
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use traits::{
    AccessGrant, AccessLevel, AccessLevelStore, AssignmentStore, BaseDocumentStore,
    ContentSetStore, DeconstructionCommit, DestructionCommit, DestructionScope, DocumentLock,
    DocumentStore, GrantStore, KeyRecordStore, LegalHold, LegalHoldStore,
    ReconstructionEventStore, RotationCommit, SecurityProfileStore, ShareStore, TransactionStore,
};
