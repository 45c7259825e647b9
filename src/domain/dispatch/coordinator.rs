use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use rust_decimal::Decimal;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};
use uuid::Uuid;

use crate::domain::order::{
    DispatchLine, DispatchMetadata, OrderAggregate, OrderCommand, OrderCommandHandler, OrderEvent,
};
use crate::error::FulfillmentError;
use crate::metrics::Metrics;

use super::batch::DispatchBatch;
use super::record_store::DispatchRecordStore;

// ============================================================================
// Dispatch Transaction Coordinator
// ============================================================================
//
// A dispatch is one transaction across two stores:
//   1. ledger deduction (Dispatched event on the order stream)
//   2. dispatch record (DispatchRecordStore::append)
//
// Submissions for the same order are serialized by a per-order lock, so
// validation and deduction always see the same balances. If step 2 fails
// after step 1, a DispatchRolledBack event restores the ledger before the
// lock is released. Readers take the same lock in shared mode, so nobody
// observes a deduction without its record.
//
// ============================================================================

/// A request to dispatch quantities from one order
#[derive(Debug, Clone)]
pub struct SubmitDispatch {
    pub order_id: Uuid,
    pub lines: Vec<DispatchLine>,
    pub metadata: DispatchMetadata,
    pub idempotency_key: Option<String>,
}

impl SubmitDispatch {
    pub fn new(order_id: Uuid, lines: Vec<DispatchLine>) -> Self {
        Self {
            order_id,
            lines,
            metadata: DispatchMetadata::default(),
            idempotency_key: None,
        }
    }

    pub fn with_metadata(mut self, metadata: DispatchMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

pub struct DispatchCoordinator {
    orders: Arc<OrderCommandHandler>,
    records: Arc<dyn DispatchRecordStore>,
    locks: DashMap<Uuid, Arc<RwLock<()>>>,
    lock_timeout: Duration,
    metrics: Option<Arc<Metrics>>,
}

impl DispatchCoordinator {
    pub fn new(
        orders: Arc<OrderCommandHandler>,
        records: Arc<dyn DispatchRecordStore>,
        lock_timeout: Duration,
    ) -> Self {
        Self {
            orders,
            records,
            locks: DashMap::new(),
            lock_timeout,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn orders(&self) -> &Arc<OrderCommandHandler> {
        &self.orders
    }

    // ========================================================================
    // Orders
    // ========================================================================

    pub async fn place_order(&self, command: OrderCommand) -> Result<OrderAggregate, FulfillmentError> {
        self.orders.place_order(command, Uuid::new_v4()).await
    }

    /// Current state of an order, never mid-dispatch
    pub async fn order(&self, order_id: Uuid) -> Result<OrderAggregate, FulfillmentError> {
        let _guard = self.read_lock(order_id).await?;
        self.orders.load(order_id).await
    }

    pub async fn remaining(&self, order_id: Uuid) -> Result<Vec<(Uuid, Decimal)>, FulfillmentError> {
        Ok(self.order(order_id).await?.ledger.remaining_by_line())
    }

    /// One page of orders in creation order, plus the total count.
    /// Each order is read under its lock, like `order`.
    pub async fn list_orders(
        &self,
        page: usize,
        limit: usize,
    ) -> Result<(Vec<OrderAggregate>, usize), FulfillmentError> {
        let ids = self.orders.event_store().aggregate_ids().await;
        let total = ids.len();

        let mut orders = Vec::new();
        for id in ids.into_iter().skip(page.saturating_sub(1) * limit).take(limit) {
            orders.push(self.order(id).await?);
        }

        Ok((orders, total))
    }

    // ========================================================================
    // Dispatches
    // ========================================================================

    /// Commit every line of the request or none of them
    pub async fn submit_dispatch(&self, request: SubmitDispatch) -> Result<DispatchBatch, FulfillmentError> {
        let started = Instant::now();
        let result = self.submit_locked(request).await;

        if let Some(metrics) = &self.metrics {
            let outcome = match &result {
                Ok(_) => "committed",
                Err(e) => e.kind(),
            };
            metrics.record_dispatch(outcome, started.elapsed().as_secs_f64());
            if let Err(e) = &result {
                for rejection in e.rejections() {
                    metrics.record_rejected_line(rejection.reason.code());
                }
            }
        }

        result
    }

    async fn submit_locked(&self, request: SubmitDispatch) -> Result<DispatchBatch, FulfillmentError> {
        if request.lines.is_empty() {
            return Err(FulfillmentError::validation("Dispatch must contain at least one line"));
        }

        let order_id = request.order_id;
        let _guard = self.write_lock(order_id).await?;

        let order = self.orders.load(order_id).await?;

        if let Some(key) = &request.idempotency_key {
            if let Some(previous) = order.committed_with_key(key) {
                if previous.lines == request.lines {
                    let batch = self.records.get_by_id(previous.dispatch_id).await?;
                    if batch.metadata == request.metadata {
                        tracing::info!(
                            order_id = %order_id,
                            dispatch_id = %previous.dispatch_id,
                            idempotency_key = %key,
                            "Replaying committed dispatch"
                        );
                        return Ok(batch);
                    }
                }
                return Err(FulfillmentError::Conflict(format!(
                    "Idempotency key {} was already used with a different dispatch",
                    key
                )));
            }
        }

        let dispatch_id = Uuid::new_v4();
        let correlation_id = Uuid::new_v4();
        let command = OrderCommand::DispatchLines {
            dispatch_id,
            lines: request.lines,
            metadata: request.metadata,
            idempotency_key: request.idempotency_key,
        };

        let outcome = match self.orders.handle_with(order, command, correlation_id).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::debug!(order_id = %order_id, error = %e, "Dispatch rejected");
                return Err(e);
            }
        };

        let dispatched = outcome.events.iter().find_map(|event| match event {
            OrderEvent::Dispatched(e) => Some(e),
            _ => None,
        });
        let Some(dispatched) = dispatched else {
            return Err(FulfillmentError::Storage(format!(
                "Dispatch {} produced no ledger deduction",
                dispatch_id
            )));
        };

        let batch = DispatchBatch::from_commit(&outcome.aggregate, dispatched);

        if let Err(e) = self.records.append(order_id, batch.clone()).await {
            tracing::error!(
                order_id = %order_id,
                dispatch_id = %dispatch_id,
                error = %e,
                "Dispatch record append failed, rolling back ledger"
            );
            self.roll_back(outcome.aggregate, dispatch_id, e.to_string(), correlation_id).await?;
            return Err(FulfillmentError::Storage(format!(
                "Dispatch {} could not be recorded: {}",
                dispatch_id, e
            )));
        }

        tracing::info!(
            order_id = %order_id,
            dispatch_id = %dispatch_id,
            invoice_number = %batch.invoice_number,
            lines = batch.lines.len(),
            status = %outcome.aggregate.status(),
            "Dispatch committed"
        );

        Ok(batch)
    }

    async fn roll_back(
        &self,
        order: OrderAggregate,
        dispatch_id: Uuid,
        reason: String,
        correlation_id: Uuid,
    ) -> Result<(), FulfillmentError> {
        let command = OrderCommand::RollBackDispatch { dispatch_id, reason };
        match self.orders.handle_with(order, command, correlation_id).await {
            Ok(_) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_rollback();
                }
                tracing::warn!(dispatch_id = %dispatch_id, "Ledger deduction rolled back");
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    dispatch_id = %dispatch_id,
                    error = %e,
                    "Ledger rollback failed, order needs reconciliation"
                );
                Err(FulfillmentError::Storage(format!(
                    "Dispatch {} rollback failed: {}",
                    dispatch_id, e
                )))
            }
        }
    }

    /// Committed dispatches of an order in creation order
    pub async fn dispatch_history(&self, order_id: Uuid) -> Result<Vec<DispatchBatch>, FulfillmentError> {
        let _guard = self.read_lock(order_id).await?;
        Ok(self.records.list_by_order(order_id).await?)
    }

    pub async fn dispatch(&self, batch_id: Uuid) -> Result<DispatchBatch, FulfillmentError> {
        Ok(self.records.get_by_id(batch_id).await?)
    }

    // ========================================================================
    // Per-order locks
    // ========================================================================

    /// Locks exist only for placed orders; orders are never removed
    async fn lock_for(&self, order_id: Uuid) -> Result<Arc<RwLock<()>>, FulfillmentError> {
        if let Some(lock) = self.locks.get(&order_id) {
            return Ok(lock.clone());
        }
        if !self.orders.event_store().aggregate_exists(order_id).await {
            return Err(FulfillmentError::not_found("Order", order_id));
        }
        Ok(self
            .locks
            .entry(order_id)
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .clone())
    }

    async fn write_lock(&self, order_id: Uuid) -> Result<OwnedRwLockWriteGuard<()>, FulfillmentError> {
        let lock = self.lock_for(order_id).await?;
        let started = Instant::now();

        let guard = tokio::time::timeout(self.lock_timeout, lock.write_owned())
            .await
            .map_err(|_| {
                tracing::warn!(order_id = %order_id, timeout_ms = self.lock_timeout.as_millis() as u64, "Order lock timed out");
                FulfillmentError::Conflict(format!("Order {} is busy, retry the dispatch", order_id))
            })?;

        if let Some(metrics) = &self.metrics {
            metrics.record_lock_wait(started.elapsed().as_secs_f64());
        }
        Ok(guard)
    }

    async fn read_lock(&self, order_id: Uuid) -> Result<OwnedRwLockReadGuard<()>, FulfillmentError> {
        let lock = self.lock_for(order_id).await?;
        tokio::time::timeout(self.lock_timeout, lock.read_owned())
            .await
            .map_err(|_| FulfillmentError::Conflict(format!("Order {} is busy", order_id)))
    }
}
