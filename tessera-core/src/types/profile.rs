//! Per-tenant security profile
//!
//! The profile collaborator exposes the knobs the core consumes: Shamir
//! parameters, storage tier, marker width, retention, and the
//! authorization-provider selector.

use serde::{Deserialize, Serialize};

use super::common::OrganizationId;
use super::key::validate_shamir_params;
use crate::error::{CoreError, CoreResult};

/// Redaction marker glyph (U+2588 FULL BLOCK)
pub const REDACTION_GLYPH: char = '\u{2588}';

/// Inclusive marker width bounds
pub const MIN_MARKER_WIDTH: u8 = 3;
pub const MAX_MARKER_WIDTH: u8 = 10;
pub const DEFAULT_MARKER_WIDTH: u8 = 3;

/// Deployment profile selecting storage separation and provider behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageTier {
    Tier1,
    Tier2,
    Tier3,
}

impl StorageTier {
    /// Default reconstruction behavior when a subset of authorized sets
    /// fails integrity verification. Tier 1 proceeds with redaction;
    /// Tier 2 and 3 halt. Tenants may override on their profile.
    pub fn default_integrity_failure_policy(&self) -> IntegrityFailurePolicy {
        match self {
            Self::Tier1 => IntegrityFailurePolicy::ProceedWithRedaction,
            Self::Tier2 | Self::Tier3 => IntegrityFailurePolicy::Halt,
        }
    }
}

/// Tenant-selected authorization provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationProviderKind {
    /// Grants-table lookup
    Conventional,
    /// External proof verifier
    ComposedProof,
}

/// What reconstruction does when a subset of authorized content sets
/// fails integrity verification. Base-document tampering always halts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrityFailurePolicy {
    /// Continue, redacting the failed sets
    ProceedWithRedaction,
    /// Abort the reconstruction
    Halt,
}

/// Per-tenant security profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityProfile {
    pub organization_id: OrganizationId,
    pub shamir_threshold: u8,
    pub shamir_total_shares: u8,
    pub storage_tier: StorageTier,
    pub marker_width: u8,
    pub export_permitted: bool,
    pub min_retention_days: u32,
    pub authorization_provider: AuthorizationProviderKind,
    /// Opaque holder identifiers for share distribution, one per share
    pub share_holder_ids: Vec<String>,
    pub integrity_failure_policy: IntegrityFailurePolicy,
}

impl SecurityProfile {
    /// A sensible Tier-1 profile for the given tenant
    pub fn tier_1(organization_id: OrganizationId, holder_ids: Vec<String>) -> Self {
        let total = holder_ids.len().min(u8::MAX as usize) as u8;
        Self {
            organization_id,
            shamir_threshold: 2,
            shamir_total_shares: total.max(3),
            storage_tier: StorageTier::Tier1,
            marker_width: DEFAULT_MARKER_WIDTH,
            export_permitted: true,
            min_retention_days: 0,
            authorization_provider: AuthorizationProviderKind::Conventional,
            share_holder_ids: holder_ids,
            integrity_failure_policy: IntegrityFailurePolicy::ProceedWithRedaction,
        }
    }

    /// Validate Shamir bounds, marker width, and the holder list
    pub fn validate(&self) -> CoreResult<()> {
        validate_shamir_params(self.shamir_threshold, self.shamir_total_shares)?;
        if self.marker_width < MIN_MARKER_WIDTH || self.marker_width > MAX_MARKER_WIDTH {
            return Err(CoreError::Validation(format!(
                "marker width {} outside [{}, {}]",
                self.marker_width, MIN_MARKER_WIDTH, MAX_MARKER_WIDTH
            )));
        }
        if self.share_holder_ids.len() != self.shamir_total_shares as usize {
            return Err(CoreError::Validation(format!(
                "expected {} share holders, got {}",
                self.shamir_total_shares,
                self.share_holder_ids.len()
            )));
        }
        Ok(())
    }

    /// The redaction marker for this tenant: U+2588 repeated by width
    pub fn redaction_marker(&self) -> String {
        std::iter::repeat(REDACTION_GLYPH)
            .take(self.marker_width as usize)
            .collect()
    }
}
