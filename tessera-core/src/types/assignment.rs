//! Approved assignment set
//!
//! Input to deconstruction, produced by the markup collaborator. Each
//! assignment routes one extraction point (a character range or a whole
//! block) into one content set. The same positional key may appear under
//! multiple content sets; that is cross-set overlap and is legal.

use serde::{Deserialize, Serialize};

use super::common::ContentSetId;
use crate::error::{CoreError, CoreResult};

/// One approved extraction assignment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovedAssignment {
    /// Target content set
    pub content_set_identifier: ContentSetId,
    /// Intermediate block the text was extracted from
    pub block_id: String,
    /// Start of the character range; absent for whole-block assignments
    pub start_offset: Option<u32>,
    /// End of the character range; absent for whole-block assignments
    pub end_offset: Option<u32>,
    /// The extracted text
    pub selected_text: Option<String>,
    /// Page the block appears on
    pub page_number: u32,
}

impl ApprovedAssignment {
    /// Offsets must be both present (character range) or both absent
    /// (whole block).
    pub fn validate(&self) -> CoreResult<()> {
        match (self.start_offset, self.end_offset) {
            (Some(start), Some(end)) if start > end => Err(CoreError::Validation(format!(
                "assignment range inverted in block {}: {} > {}",
                self.block_id, start, end
            ))),
            (Some(_), None) | (None, Some(_)) => Err(CoreError::Validation(format!(
                "assignment in block {} has a half-open offset range",
                self.block_id
            ))),
            _ => Ok(()),
        }
    }

    /// Positional key used for adjacency merging
    pub fn positional_key(&self) -> (String, Option<u32>, Option<u32>) {
        (self.block_id.clone(), self.start_offset, self.end_offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assignment(start: Option<u32>, end: Option<u32>) -> ApprovedAssignment {
        ApprovedAssignment {
            content_set_identifier: ContentSetId::new("CS-PUBLIC"),
            block_id: "block-1".to_string(),
            start_offset: start,
            end_offset: end,
            selected_text: Some("text".to_string()),
            page_number: 1,
        }
    }

    #[test]
    fn test_whole_block_valid() {
        assert!(assignment(None, None).validate().is_ok());
    }

    #[test]
    fn test_range_valid() {
        assert!(assignment(Some(0), Some(10)).validate().is_ok());
    }

    #[test]
    fn test_half_open_range_rejected() {
        assert!(assignment(Some(0), None).validate().is_err());
        assert!(assignment(None, Some(10)).validate().is_err());
    }

    #[test]
    fn test_inverted_range_rejected() {
        assert!(assignment(Some(10), Some(2)).validate().is_err());
    }
}
