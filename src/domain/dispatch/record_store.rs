use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::batch::DispatchBatch;

// ============================================================================
// Dispatch Record Store
// ============================================================================
//
// Append-only history of committed dispatches, keyed by parent order.
// Only the dispatch coordinator appends, and only after the ledger commit.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum RecordStoreError {
    #[error("Dispatch not found: {0}")]
    NotFound(Uuid),

    #[error("Dispatch {0} already recorded")]
    Duplicate(Uuid),

    #[error("Dispatch {batch_id} belongs to order {actual}, not {expected}")]
    OrderMismatch { batch_id: Uuid, expected: Uuid, actual: Uuid },

    #[error("Record store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait DispatchRecordStore: Send + Sync {
    /// Record a committed dispatch for `order_id`
    async fn append(&self, order_id: Uuid, batch: DispatchBatch) -> Result<(), RecordStoreError>;

    /// Dispatches of an order in creation order
    async fn list_by_order(&self, order_id: Uuid) -> Result<Vec<DispatchBatch>, RecordStoreError>;

    async fn get_by_id(&self, batch_id: Uuid) -> Result<DispatchBatch, RecordStoreError>;
}

#[derive(Default)]
struct RecordState {
    batches: HashMap<Uuid, DispatchBatch>,
    by_order: HashMap<Uuid, Vec<Uuid>>,
}

#[derive(Default)]
pub struct InMemoryDispatchRecordStore {
    state: RwLock<RecordState>,
}

impl InMemoryDispatchRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DispatchRecordStore for InMemoryDispatchRecordStore {
    async fn append(&self, order_id: Uuid, batch: DispatchBatch) -> Result<(), RecordStoreError> {
        if batch.order_id != order_id {
            return Err(RecordStoreError::OrderMismatch {
                batch_id: batch.id,
                expected: order_id,
                actual: batch.order_id,
            });
        }

        let mut state = self.state.write().await;
        if state.batches.contains_key(&batch.id) {
            return Err(RecordStoreError::Duplicate(batch.id));
        }

        tracing::debug!(order_id = %order_id, dispatch_id = %batch.id, "Recording dispatch");

        state.by_order.entry(order_id).or_default().push(batch.id);
        state.batches.insert(batch.id, batch);
        Ok(())
    }

    async fn list_by_order(&self, order_id: Uuid) -> Result<Vec<DispatchBatch>, RecordStoreError> {
        let state = self.state.read().await;
        Ok(state
            .by_order
            .get(&order_id)
            .map(|ids| ids.iter().filter_map(|id| state.batches.get(id).cloned()).collect())
            .unwrap_or_default())
    }

    async fn get_by_id(&self, batch_id: Uuid) -> Result<DispatchBatch, RecordStoreError> {
        let state = self.state.read().await;
        state
            .batches
            .get(&batch_id)
            .cloned()
            .ok_or(RecordStoreError::NotFound(batch_id))
    }
}
