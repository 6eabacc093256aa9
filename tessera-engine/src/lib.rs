//! Tessera Engine - Document Lifecycle Drivers
//!
//! The cryptographic document lifecycle engine: deconstruction into
//! independently encrypted content sets, viewer-tailored reconstruction
//! with uniform-width redaction, key rotation, and verified destruction.
//!
//! # Structure
//!
//! [`TesseraEngine`] exposes the transport-neutral core operations over an
//! [`EngineContext`] that threads every dependency (stores, HSM provider,
//! audit sink, anchor sink, authorization provider) explicitly - no
//! ambient globals.
//!
//! # Transaction discipline
//!
//! Deconstruction, rotation and destruction serialize per document via a
//! row-level lock, stage all writes, and commit them atomically; any
//! failure rolls back and rewinds the lifecycle status
//! (`deconstructing -> approved`, `destroying -> active`). Reconstruction
//! takes no exclusive locks and resolves the currently active key record
//! at load time, so it tolerates in-flight rotations.
//!
//! # Event discipline
//!
//! Every operation emits exactly one primary audit event. Anchor-sink
//! submissions are best-effort: unreachability is a warning and the event
//! stays unanchored for the sink to retry.

pub mod authorization;
pub mod context;
pub mod deconstruct;
pub mod destruction;
pub mod engine;
pub mod error;
pub mod reconstruct;
pub mod rotation;
pub mod verify;

pub use authorization::{
    AccessType, AuthorizationProvider, AuthorizationRequest, AuthorizationResult,
    ComposedProofProvider, ContentSetRef, ConventionalProvider, ProofBundle, ProofVerifier,
    VerifierError,
};
pub use context::{EngineContext, DEFAULT_OP_TIMEOUT};
pub use deconstruct::DeconstructionOutcome;
pub use destruction::DestructionOutcome;
pub use engine::TesseraEngine;
pub use error::{DenialReason, EngineError, EngineResult};
pub use rotation::RotationOutcome;
pub use verify::{ContentSetIntegrity, IntegrityReport};
