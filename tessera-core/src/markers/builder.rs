//! Marker builder
//!
//! Turns an approved assignment set into positional markers and per-set
//! payload buffers. Assignments sharing a positional key collapse into one
//! merged marker; the base-document serialization carries position and
//! order only, never membership or content.

use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

use super::payload::{render_payload, PayloadRecord};
use crate::error::CoreResult;
use crate::types::{ApprovedAssignment, BaseMarkerEntry, ContentSetId, PositionalMarker, Sha512Digest};

/// Output of a marker build: document-ordered markers and one rendered
/// payload per content set.
#[derive(Debug)]
pub struct MarkerBuildOutput {
    pub markers: Vec<PositionalMarker>,
    /// BTreeMap so iteration follows ascending set-identifier order, the
    /// order deconstruction encrypts in
    pub payloads: BTreeMap<ContentSetId, String>,
}

/// Build markers and per-set payloads from an approved assignment set.
pub fn build_markers(assignments: &[ApprovedAssignment]) -> CoreResult<MarkerBuildOutput> {
    for assignment in assignments {
        assignment.validate()?;
    }

    // Deterministic processing order: block, offsets (nulls first), set id
    let mut sorted: Vec<&ApprovedAssignment> = assignments.iter().collect();
    sorted.sort_by(|a, b| {
        a.block_id
            .cmp(&b.block_id)
            .then(a.start_offset.cmp(&b.start_offset))
            .then(a.end_offset.cmp(&b.end_offset))
            .then(a.content_set_identifier.cmp(&b.content_set_identifier))
    });

    let mut markers: Vec<PositionalMarker> = Vec::new();
    let mut by_position: HashMap<(String, Option<u32>, Option<u32>), usize> = HashMap::new();
    let mut payload_records: BTreeMap<ContentSetId, Vec<PayloadRecord>> = BTreeMap::new();
    let mut sequence: u32 = 0;

    for assignment in sorted {
        let key = assignment.positional_key();
        let marker_index = match by_position.get(&key) {
            Some(&index) => {
                let marker = &mut markers[index];
                if !marker.is_member_of(&assignment.content_set_identifier) {
                    marker
                        .content_set_membership
                        .push(assignment.content_set_identifier.clone());
                }
                if marker.content_set_membership.len() >= 2 {
                    marker.is_merged = true;
                }
                index
            }
            None => {
                sequence += 1;
                let text = assignment.selected_text.as_deref().unwrap_or("");
                markers.push(PositionalMarker {
                    marker_id: Uuid::new_v4(),
                    content_set_membership: vec![assignment.content_set_identifier.clone()],
                    block_id: assignment.block_id.clone(),
                    start_offset: assignment.start_offset,
                    end_offset: assignment.end_offset,
                    content_hash: Sha512Digest::compute(text.as_bytes()),
                    sequence_position: sequence,
                    is_merged: false,
                });
                by_position.insert(key, markers.len() - 1);
                markers.len() - 1
            }
        };

        payload_records
            .entry(assignment.content_set_identifier.clone())
            .or_default()
            .push(PayloadRecord {
                marker_id: markers[marker_index].marker_id,
                block_id: assignment.block_id.clone(),
                start_offset: assignment.start_offset,
                end_offset: assignment.end_offset,
                content: assignment.selected_text.clone().unwrap_or_default(),
                page_number: assignment.page_number,
            });
    }

    let mut payloads = BTreeMap::new();
    for (set, records) in payload_records {
        payloads.insert(set, render_payload(&records)?);
    }

    Ok(MarkerBuildOutput { markers, payloads })
}

/// Serialize the opaque base document: per marker, only identity,
/// position and document order. Membership never appears here.
pub fn serialize_base_document(markers: &[PositionalMarker]) -> CoreResult<String> {
    let entries: Vec<BaseMarkerEntry> = markers.iter().map(BaseMarkerEntry::from).collect();
    Ok(serde_json::to_string(&entries)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assignment(set: &str, block: &str, range: Option<(u32, u32)>, text: &str) -> ApprovedAssignment {
        ApprovedAssignment {
            content_set_identifier: ContentSetId::new(set),
            block_id: block.to_string(),
            start_offset: range.map(|(s, _)| s),
            end_offset: range.map(|(_, e)| e),
            selected_text: Some(text.to_string()),
            page_number: 1,
        }
    }

    #[test]
    fn test_distinct_positions_distinct_markers() {
        let output = build_markers(&[
            assignment("CS-PUBLIC", "b1", Some((0, 17)), "Public statement."),
            assignment("CS-CONFIDENTIAL", "b2", Some((0, 13)), "Budget $4.2M."),
            assignment("CS-SECRET", "b3", Some((0, 12)), "Agent Smith."),
        ])
        .unwrap();

        assert_eq!(output.markers.len(), 3);
        let positions: Vec<u32> = output.markers.iter().map(|m| m.sequence_position).collect();
        assert_eq!(positions, vec![1, 2, 3]);
        assert!(output.markers.iter().all(|m| !m.is_merged));
        assert_eq!(output.payloads.len(), 3);
    }

    #[test]
    fn test_adjacency_merge() {
        // Same positional key under two sets: one marker, merged
        let output = build_markers(&[
            assignment("CS-CONFIDENTIAL", "b2", Some((0, 13)), "Budget $4.2M."),
            assignment("CS-SECRET", "b2", Some((0, 13)), "Budget $4.2M."),
        ])
        .unwrap();

        assert_eq!(output.markers.len(), 1);
        let marker = &output.markers[0];
        assert!(marker.is_merged);
        assert_eq!(
            marker.content_set_membership,
            vec![
                ContentSetId::new("CS-CONFIDENTIAL"),
                ContentSetId::new("CS-SECRET")
            ]
        );

        // Content is duplicated into both payloads under the same marker
        for set in ["CS-CONFIDENTIAL", "CS-SECRET"] {
            let payload = &output.payloads[&ContentSetId::new(set)];
            assert!(payload.contains(&marker.marker_id.to_string()));
            assert!(payload.contains("Budget $4.2M."));
        }
    }

    #[test]
    fn test_membership_deduplicated() {
        let output = build_markers(&[
            assignment("CS-PUBLIC", "b1", None, "text"),
            assignment("CS-PUBLIC", "b1", None, "text"),
        ])
        .unwrap();

        assert_eq!(output.markers.len(), 1);
        assert_eq!(output.markers[0].content_set_membership.len(), 1);
        assert!(!output.markers[0].is_merged);
    }

    #[test]
    fn test_deterministic_ordering() {
        // Same assignments, shuffled input order: same marker sequence
        let a = build_markers(&[
            assignment("CS-B", "b2", Some((0, 4)), "two"),
            assignment("CS-A", "b1", Some((0, 4)), "one"),
        ])
        .unwrap();
        let b = build_markers(&[
            assignment("CS-A", "b1", Some((0, 4)), "one"),
            assignment("CS-B", "b2", Some((0, 4)), "two"),
        ])
        .unwrap();

        let order_a: Vec<(&str, u32)> = a
            .markers
            .iter()
            .map(|m| (m.block_id.as_str(), m.sequence_position))
            .collect();
        let order_b: Vec<(&str, u32)> = b
            .markers
            .iter()
            .map(|m| (m.block_id.as_str(), m.sequence_position))
            .collect();
        assert_eq!(order_a, order_b);
    }

    #[test]
    fn test_whole_block_sorts_before_ranges() {
        let output = build_markers(&[
            assignment("CS-A", "b1", Some((0, 4)), "range"),
            assignment("CS-A", "b1", None, "whole block"),
        ])
        .unwrap();

        assert_eq!(output.markers.len(), 2);
        assert_eq!(output.markers[0].start_offset, None);
        assert_eq!(output.markers[0].sequence_position, 1);
    }

    #[test]
    fn test_content_hash_binds_original_text() {
        let output = build_markers(&[assignment("CS-A", "b1", None, "Agent Smith.")]).unwrap();
        assert_eq!(
            output.markers[0].content_hash,
            Sha512Digest::compute(b"Agent Smith.")
        );
    }

    #[test]
    fn test_base_serialization_is_opaque() {
        let output = build_markers(&[
            assignment("CS-SECRET", "b1", Some((0, 12)), "Agent Smith."),
            assignment("CS-CONFIDENTIAL", "b1", Some((0, 12)), "Agent Smith."),
        ])
        .unwrap();

        let base = serialize_base_document(&output.markers).unwrap();
        assert!(!base.contains("CS-SECRET"));
        assert!(!base.contains("CS-CONFIDENTIAL"));
        assert!(!base.contains("Agent Smith."));
        assert!(!base.contains("content_hash"));
        assert!(!base.contains("is_merged"));
        assert!(base.contains("sequence_position"));
    }

    #[test]
    fn test_missing_text_hashes_empty_string() {
        let mut a = assignment("CS-A", "b1", None, "");
        a.selected_text = None;
        let output = build_markers(&[a]).unwrap();
        assert_eq!(output.markers[0].content_hash, Sha512Digest::compute(b""));
    }
}
