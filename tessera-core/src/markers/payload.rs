//! Content-set payload records
//!
//! Each content set's plaintext payload is a newline-delimited sequence of
//! JSON records, one per assignment routed into the set. Content assigned
//! to multiple sets appears in each set's payload (duplication) and
//! resolves to the same marker on reconstruction (de-duplication).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};

/// One extraction record inside a content-set payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayloadRecord {
    pub marker_id: Uuid,
    pub block_id: String,
    pub start_offset: Option<u32>,
    pub end_offset: Option<u32>,
    pub content: String,
    pub page_number: u32,
}

/// Render records as newline-delimited JSON
pub fn render_payload(records: &[PayloadRecord]) -> CoreResult<String> {
    let mut lines = Vec::with_capacity(records.len());
    for record in records {
        lines.push(serde_json::to_string(record)?);
    }
    Ok(lines.join("\n"))
}

/// Parse a decrypted payload back into a marker-keyed map
pub fn parse_payload(payload: &str) -> CoreResult<HashMap<Uuid, PayloadRecord>> {
    let mut map = HashMap::new();
    for line in payload.lines() {
        if line.is_empty() {
            continue;
        }
        let record: PayloadRecord = serde_json::from_str(line)
            .map_err(|e| CoreError::Serialization(format!("bad payload record: {}", e)))?;
        map.insert(record.marker_id, record);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(content: &str) -> PayloadRecord {
        PayloadRecord {
            marker_id: Uuid::new_v4(),
            block_id: "b1".to_string(),
            start_offset: Some(0),
            end_offset: Some(content.len() as u32),
            content: content.to_string(),
            page_number: 1,
        }
    }

    #[test]
    fn test_render_parse_roundtrip() {
        let records = vec![record("alpha"), record("beta")];
        let payload = render_payload(&records).unwrap();
        assert_eq!(payload.lines().count(), 2);

        let map = parse_payload(&payload).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map[&records[0].marker_id].content, "alpha");
        assert_eq!(map[&records[1].marker_id].content, "beta");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_payload("not json").is_err());
    }

    #[test]
    fn test_empty_payload() {
        assert!(parse_payload("").unwrap().is_empty());
    }
}
