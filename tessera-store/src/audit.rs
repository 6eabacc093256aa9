//! Append-only audit sink
//!
//! Every engine operation emits exactly one primary audit event here,
//! plus per-stage integrity-failure events during reconstruction. The
//! sink's API is append-and-read only; there is no update or delete
//! surface, in application code or in this trait. Deployments back this
//! with a table whose trigger raises on UPDATE/DELETE.

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use tessera_core::types::AuditEvent;

use crate::error::StoreResult;

/// Append-only audit event sink. Never receives secrets or key material.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Append one event; returns the assigned event id
    async fn record(&self, event: AuditEvent) -> StoreResult<String>;

    /// Events for one target, in append order
    async fn events_for_target(&self, target_id: &str) -> StoreResult<Vec<AuditEvent>>;

    /// Events of one type, in append order
    async fn events_of_type(&self, event_type: &str) -> StoreResult<Vec<AuditEvent>>;

    /// Total appended events
    async fn event_count(&self) -> StoreResult<usize>;
}

/// In-memory append-only sink
pub struct MemoryAuditSink {
    events: RwLock<Vec<(String, AuditEvent)>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self {
            events: RwLock::new(Vec::new()),
        }
    }
}

impl Default for MemoryAuditSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, event: AuditEvent) -> StoreResult<String> {
        let event_id = format!("audit:{}", Uuid::new_v4());
        debug!(
            event_type = %event.event_type,
            target_id = %event.target_id,
            "audit event recorded"
        );
        self.events.write().await.push((event_id.clone(), event));
        Ok(event_id)
    }

    async fn events_for_target(&self, target_id: &str) -> StoreResult<Vec<AuditEvent>> {
        Ok(self
            .events
            .read()
            .await
            .iter()
            .filter(|(_, e)| e.target_id == target_id)
            .map(|(_, e)| e.clone())
            .collect())
    }

    async fn events_of_type(&self, event_type: &str) -> StoreResult<Vec<AuditEvent>> {
        Ok(self
            .events
            .read()
            .await
            .iter()
            .filter(|(_, e)| e.event_type == event_type)
            .map(|(_, e)| e.clone())
            .collect())
    }

    async fn event_count(&self) -> StoreResult<usize> {
        Ok(self.events.read().await.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::types::AuditCategory;

    fn event(event_type: &str, target: &str) -> AuditEvent {
        AuditEvent::new(
            AuditCategory::Action,
            event_type,
            "test",
            "document",
            target,
            serde_json::json!({}),
        )
    }

    #[tokio::test]
    async fn test_append_and_query() {
        let sink = MemoryAuditSink::new();
        sink.record(event("document.deconstructed", "doc:1")).await.unwrap();
        sink.record(event("document.reconstructed", "doc:1")).await.unwrap();
        sink.record(event("document.reconstructed", "doc:2")).await.unwrap();

        assert_eq!(sink.event_count().await.unwrap(), 3);
        assert_eq!(sink.events_for_target("doc:1").await.unwrap().len(), 2);
        assert_eq!(
            sink.events_of_type("document.reconstructed").await.unwrap().len(),
            2
        );
    }

    #[tokio::test]
    async fn test_append_order_preserved() {
        let sink = MemoryAuditSink::new();
        for i in 0..5 {
            sink.record(event("e", &format!("doc:{}", i))).await.unwrap();
        }
        let all: Vec<String> = sink
            .events_of_type("e")
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.target_id)
            .collect();
        assert_eq!(all, vec!["doc:0", "doc:1", "doc:2", "doc:3", "doc:4"]);
    }
}
