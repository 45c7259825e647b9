use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::FulfillmentError;
use crate::event_sourcing::{Aggregate, EventEnvelope, EventStore};

use super::aggregate::OrderAggregate;
use super::commands::OrderCommand;
use super::errors::OrderError;
use super::events::OrderEvent;

// ============================================================================
// Order Command Handler
// ============================================================================
//
// Orchestrates: Command → Aggregate → Events → Event Store
//
// This is also the persistence side of the quantity ledger: balances are read
// by replaying the order stream, and deductions are committed by appending a
// Dispatched event at the version they were validated against.
//
// ============================================================================

/// What a successful command left behind
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub aggregate: OrderAggregate,
    pub events: Vec<OrderEvent>,
    pub version: i64,
}

pub struct OrderCommandHandler {
    event_store: Arc<EventStore<OrderEvent>>,
    order_numbers: DashMap<String, Uuid>,
}

impl OrderCommandHandler {
    pub fn new(event_store: Arc<EventStore<OrderEvent>>) -> Self {
        Self {
            event_store,
            order_numbers: DashMap::new(),
        }
    }

    pub fn event_store(&self) -> &Arc<EventStore<OrderEvent>> {
        &self.event_store
    }

    /// Create a new order stream. Order numbers are unique.
    pub async fn place_order(
        &self,
        command: OrderCommand,
        correlation_id: Uuid,
    ) -> Result<OrderAggregate, FulfillmentError> {
        let OrderCommand::PlaceOrder { order_no, .. } = &command else {
            return Err(OrderError::NotInitialized.into());
        };
        let order_no = order_no.trim().to_string();
        let events = OrderAggregate::place(&command)?;

        let order_id = Uuid::new_v4();
        match self.order_numbers.entry(order_no.clone()) {
            Entry::Occupied(existing) => {
                return Err(FulfillmentError::Conflict(format!(
                    "Order number {} already used by order {}",
                    order_no,
                    existing.get()
                )));
            }
            Entry::Vacant(slot) => {
                slot.insert(order_id);
            }
        }

        if let Err(e) = self.persist(order_id, 0, &events, correlation_id).await {
            self.order_numbers.remove(&order_no);
            return Err(e);
        }

        tracing::info!(order_id = %order_id, order_no = %order_no, "Order placed");

        self.load(order_id).await
    }

    /// Rebuild the current state of an order. Takes no order lock, so API
    /// reads go through the dispatch coordinator instead.
    pub async fn load(&self, order_id: Uuid) -> Result<OrderAggregate, FulfillmentError> {
        Ok(self.event_store.load_aggregate::<OrderAggregate>(order_id).await?)
    }

    pub fn find_by_order_no(&self, order_no: &str) -> Option<Uuid> {
        self.order_numbers.get(order_no.trim()).map(|id| *id)
    }

    /// Handle a command against an existing order and persist resulting events
    pub async fn handle(
        &self,
        order_id: Uuid,
        command: OrderCommand,
        correlation_id: Uuid,
    ) -> Result<CommandOutcome, FulfillmentError> {
        let aggregate = self.load(order_id).await?;
        self.handle_with(aggregate, command, correlation_id).await
    }

    /// Handle a command against state the caller already loaded.
    /// The append fails with a conflict if the stream moved on since.
    pub async fn handle_with(
        &self,
        mut aggregate: OrderAggregate,
        command: OrderCommand,
        correlation_id: Uuid,
    ) -> Result<CommandOutcome, FulfillmentError> {
        let order_id = aggregate.id;
        let expected_version = aggregate.version();

        let events = aggregate.handle_command(&command)?;
        if events.is_empty() {
            return Ok(CommandOutcome { aggregate, events, version: expected_version });
        }

        let version = self.persist(order_id, expected_version, &events, correlation_id).await?;

        for event in &events {
            aggregate.apply_event(event)?;
        }
        aggregate.set_version(version);

        Ok(CommandOutcome { aggregate, events, version })
    }

    async fn persist(
        &self,
        order_id: Uuid,
        expected_version: i64,
        events: &[OrderEvent],
        correlation_id: Uuid,
    ) -> Result<i64, FulfillmentError> {
        let envelopes = events
            .iter()
            .enumerate()
            .map(|(offset, event)| {
                EventEnvelope::new(
                    order_id,
                    expected_version + offset as i64 + 1,
                    event.clone(),
                    correlation_id,
                )
            })
            .collect();

        Ok(self
            .event_store
            .append_events(order_id, expected_version, envelopes, true)
            .await?)
    }
}
