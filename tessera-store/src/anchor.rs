//! Anchor sink
//!
//! Mirrors significant lifecycle events to an external blockchain
//! anchoring collaborator. Sink unreachability is a warning for the
//! engines, never a fault: persistence has already committed by the time
//! a transaction is submitted, and retry is the sink's responsibility.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

use tessera_core::types::{AnchorReceipt, AnchorTransaction};

use crate::error::{StoreError, StoreResult};

/// Anchor transaction sink
#[async_trait]
pub trait AnchorSink: Send + Sync {
    /// Submit one transaction; returns the sink's forwarding receipt
    async fn submit(&self, transaction: AnchorTransaction) -> StoreResult<AnchorReceipt>;
}

/// In-memory anchor sink with a reachability toggle for failure-path tests
pub struct MemoryAnchorSink {
    accepted: RwLock<Vec<AnchorTransaction>>,
    unreachable: AtomicBool,
}

impl MemoryAnchorSink {
    pub fn new() -> Self {
        Self {
            accepted: RwLock::new(Vec::new()),
            unreachable: AtomicBool::new(false),
        }
    }

    /// Simulate sink outage
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Transactions accepted so far
    pub async fn accepted(&self) -> Vec<AnchorTransaction> {
        self.accepted.read().await.clone()
    }

    pub async fn accepted_count(&self) -> usize {
        self.accepted.read().await.len()
    }
}

impl Default for MemoryAnchorSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnchorSink for MemoryAnchorSink {
    async fn submit(&self, transaction: AnchorTransaction) -> StoreResult<AnchorReceipt> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(StoreError::Unreachable("anchor sink offline".to_string()));
        }

        let receipt = AnchorReceipt {
            forward_tx_id: format!("fwd:{}", Uuid::new_v4()),
            external_tx_id: None,
        };
        self.accepted.write().await.push(transaction);
        Ok(receipt)
    }
}
