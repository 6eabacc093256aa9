//! The Tessera engine
//!
//! One struct exposes the six transport-neutral core operations; their
//! implementations live in the sibling modules:
//!
//! - [`deconstruct`](TesseraEngine::deconstruct) ([`crate::deconstruct`])
//! - [`reconstruct`](TesseraEngine::reconstruct) ([`crate::reconstruct`])
//! - [`rotate_keys`](TesseraEngine::rotate_keys) ([`crate::rotation`])
//! - [`destroy`](TesseraEngine::destroy) and
//!   [`destroy_content_set`](TesseraEngine::destroy_content_set)
//!   ([`crate::destruction`])
//! - [`verify_integrity`](TesseraEngine::verify_integrity) ([`crate::verify`])

use tessera_core::types::{Document, DocumentId, SecurityProfile};

use crate::context::EngineContext;
use crate::error::{EngineError, EngineResult};

/// Request-scoped driver over an [`EngineContext`]
pub struct TesseraEngine {
    pub(crate) ctx: EngineContext,
}

impl TesseraEngine {
    pub fn new(ctx: EngineContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &EngineContext {
        &self.ctx
    }

    /// Load a document or fail the precondition
    pub(crate) async fn require_document(&self, id: &DocumentId) -> EngineResult<Document> {
        self.ctx
            .documents
            .get_document(id)
            .await?
            .ok_or_else(|| EngineError::PreconditionViolation(format!("document {} not found", id)))
    }

    /// Load and validate the tenant's security profile
    pub(crate) async fn require_profile(&self, document: &Document) -> EngineResult<SecurityProfile> {
        let profile = self
            .ctx
            .profiles
            .get_profile(&document.organization_id)
            .await?
            .ok_or_else(|| {
                EngineError::PreconditionViolation(format!(
                    "no security profile for organization {}",
                    document.organization_id
                ))
            })?;
        profile.validate()?;
        Ok(profile)
    }
}
