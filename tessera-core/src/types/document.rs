//! Document entity and lifecycle state machine
//!
//! A document enters the core in state `approved`, transitions through
//! `deconstructing -> active` on success, may cycle through key rotations
//! while `active`, and terminates at `destroyed`. The core only governs
//! transitions among `{approved, deconstructing, active, destroying,
//! destroyed}`; every other transition in that subset is forbidden.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::common::{DocumentId, OrganizationId};
use crate::error::{CoreError, CoreResult};

/// Document lifecycle status
///
/// The intake/markup/review states belong to upstream collaborators; they
/// are modeled so the state machine can refuse documents that have not yet
/// been approved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Intake,
    IntakeFlagged,
    IntakeCleared,
    Markup,
    MarkupSubmitted,
    Review,
    ReviewEscalated,
    /// Markup approved; eligible for deconstruction
    Approved,
    /// Deconstruction transaction in flight
    Deconstructing,
    /// Deconstructed; envelopes and base document persisted
    Active,
    /// Destruction transaction in flight
    Destroying,
    /// Cryptographically destroyed. Terminal.
    Destroyed,
}

impl DocumentStatus {
    /// Whether this status belongs to the subset the core governs
    pub fn is_core_managed(&self) -> bool {
        matches!(
            self,
            Self::Approved | Self::Deconstructing | Self::Active | Self::Destroying | Self::Destroyed
        )
    }

    /// Whether the status is terminal
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Destroyed)
    }

    /// Whether a transition is permitted within the core-managed subset.
    ///
    /// Allowed: `approved -> deconstructing` (deconstruction start),
    /// `deconstructing -> active` (commit), `deconstructing -> approved`
    /// (rollback), `active -> destroying -> destroyed` (destruction).
    pub fn can_transition(&self, to: DocumentStatus) -> bool {
        matches!(
            (self, to),
            (Self::Approved, Self::Deconstructing)
                | (Self::Deconstructing, Self::Active)
                | (Self::Deconstructing, Self::Approved)
                | (Self::Active, Self::Destroying)
                | (Self::Destroying, Self::Destroyed)
        )
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Intake => "intake",
            Self::IntakeFlagged => "intake_flagged",
            Self::IntakeCleared => "intake_cleared",
            Self::Markup => "markup",
            Self::MarkupSubmitted => "markup_submitted",
            Self::Review => "review",
            Self::ReviewEscalated => "review_escalated",
            Self::Approved => "approved",
            Self::Deconstructing => "deconstructing",
            Self::Active => "active",
            Self::Destroying => "destroying",
            Self::Destroyed => "destroyed",
        };
        write!(f, "{}", s)
    }
}

/// Document row. Identity is `(id, organization_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Document identifier
    pub id: DocumentId,
    /// Owning tenant
    pub organization_id: OrganizationId,
    /// Lifecycle status
    pub status: DocumentStatus,
    /// Version chain: the document this one superseded, if any.
    /// New rows reference old ids; old rows are never mutated to point
    /// back, so chains cannot form cycles.
    pub previous_version_id: Option<DocumentId>,
    /// Earliest date destruction may take effect
    pub retention_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Create a new document row in the given status
    pub fn new(id: DocumentId, organization_id: OrganizationId, status: DocumentStatus) -> Self {
        let now = Utc::now();
        Self {
            id,
            organization_id,
            status,
            previous_version_id: None,
            retention_until: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a lifecycle transition, failing if the state machine forbids it
    pub fn transition(&mut self, to: DocumentStatus) -> CoreResult<()> {
        if !self.status.can_transition(to) {
            return Err(CoreError::InvalidStateTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Whether the retention window has elapsed (no window counts as elapsed)
    pub fn retention_elapsed(&self) -> bool {
        self.retention_until.map(|t| t <= Utc::now()).unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(status: DocumentStatus) -> Document {
        Document::new(
            DocumentId::new("doc:1"),
            OrganizationId::new("org:1"),
            status,
        )
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut d = doc(DocumentStatus::Approved);
        d.transition(DocumentStatus::Deconstructing).unwrap();
        d.transition(DocumentStatus::Active).unwrap();
        d.transition(DocumentStatus::Destroying).unwrap();
        d.transition(DocumentStatus::Destroyed).unwrap();
        assert!(d.status.is_terminal());
    }

    #[test]
    fn test_rollback_transition() {
        let mut d = doc(DocumentStatus::Deconstructing);
        d.transition(DocumentStatus::Approved).unwrap();
        assert_eq!(d.status, DocumentStatus::Approved);
    }

    #[test]
    fn test_destroyed_is_terminal() {
        let mut d = doc(DocumentStatus::Destroyed);
        for to in [
            DocumentStatus::Approved,
            DocumentStatus::Deconstructing,
            DocumentStatus::Active,
            DocumentStatus::Destroying,
        ] {
            assert!(matches!(
                d.transition(to),
                Err(CoreError::InvalidStateTransition { .. })
            ));
        }
    }

    #[test]
    fn test_intake_states_are_not_core_managed() {
        assert!(!DocumentStatus::Intake.is_core_managed());
        assert!(!DocumentStatus::MarkupSubmitted.is_core_managed());
        assert!(DocumentStatus::Approved.is_core_managed());
    }

    #[test]
    fn test_no_skip_transitions() {
        let mut d = doc(DocumentStatus::Approved);
        // Cannot jump straight to active or destroyed
        assert!(d.transition(DocumentStatus::Active).is_err());
        assert!(d.transition(DocumentStatus::Destroyed).is_err());
    }

    #[test]
    fn test_status_serde_snake_case() {
        let json = serde_json::to_string(&DocumentStatus::Deconstructing).unwrap();
        assert_eq!(json, "\"deconstructing\"");
    }
}
