use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event_sourcing::Aggregate;
use super::commands::OrderCommand;
use super::errors::OrderError;
use super::events::*;
use super::ledger::QuantityLedger;
use super::status::resolve_status;
use super::value_objects::{DispatchLine, OrderLine, OrderStatus};

// ============================================================================
// Order Aggregate - Domain Logic
// ============================================================================

/// A dispatch as the aggregate remembers it, for idempotency and rollback
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchEntry {
    pub dispatch_id: Uuid,
    pub sequence: u32,
    pub lines: Vec<DispatchLine>,
    pub idempotency_key: Option<String>,
    pub rolled_back: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderAggregate {
    // Identity
    pub id: Uuid,
    pub version: i64,
    pub order_no: String,

    // Header
    pub client_id: Uuid,
    pub due_date: Option<NaiveDate>,
    pub gst_rate: Decimal,

    // Current State (derived from events)
    pub ledger: QuantityLedger,
    pub dispatches: Vec<DispatchEntry>,

    // Audit Trail
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderAggregate {
    /// Validate a new order and emit its first event.
    /// Creation has no prior state, so it does not go through `handle_command`.
    pub fn place(command: &OrderCommand) -> Result<Vec<OrderEvent>, OrderError> {
        let OrderCommand::PlaceOrder { order_no, client_id, due_date, gst_rate, lines } = command else {
            return Err(OrderError::NotInitialized);
        };

        if order_no.trim().is_empty() {
            return Err(OrderError::EmptyOrderNumber);
        }
        if *gst_rate < Decimal::ZERO {
            return Err(OrderError::InvalidGstRate(*gst_rate));
        }
        Self::validate_lines(lines)?;

        Ok(vec![OrderEvent::Placed(OrderPlaced {
            order_no: order_no.trim().to_string(),
            client_id: *client_id,
            due_date: *due_date,
            gst_rate: *gst_rate,
            lines: lines.clone(),
            placed_at: Utc::now(),
        })])
    }

    fn validate_lines(lines: &[OrderLine]) -> Result<(), OrderError> {
        if lines.is_empty() {
            return Err(OrderError::EmptyLines);
        }

        let mut seen = HashSet::new();
        for line in lines {
            if !seen.insert(line.product_id) {
                return Err(OrderError::DuplicateProduct(line.product_id));
            }
            if line.ordered_quantity <= Decimal::ZERO {
                return Err(OrderError::InvalidQuantity {
                    product_id: line.product_id,
                    quantity: line.ordered_quantity,
                });
            }
            if line.rate < Decimal::ZERO {
                return Err(OrderError::InvalidRate { product_id: line.product_id, rate: line.rate });
            }
            if let Some(discount) = line.discount {
                if discount < Decimal::ZERO || discount > Decimal::ONE_HUNDRED {
                    return Err(OrderError::InvalidDiscount { product_id: line.product_id, discount });
                }
            }
        }

        Ok(())
    }

    pub fn status(&self) -> OrderStatus {
        resolve_status(&self.ledger)
    }

    pub fn total_amount(&self) -> Decimal {
        self.ledger.lines().iter().map(|l| l.line.amount()).sum()
    }

    /// Dispatches that are still in force, in commit order
    pub fn active_dispatches(&self) -> impl Iterator<Item = &DispatchEntry> {
        self.dispatches.iter().filter(|d| !d.rolled_back)
    }

    /// The dispatch still in force that was committed under `key`
    pub fn committed_with_key(&self, key: &str) -> Option<&DispatchEntry> {
        self.active_dispatches()
            .find(|d| d.idempotency_key.as_deref() == Some(key))
    }
}

// ============================================================================
// Aggregate Trait Implementation
// ============================================================================

impl Aggregate for OrderAggregate {
    type Event = OrderEvent;
    type Command = OrderCommand;
    type Error = OrderError;

    fn apply_first_event(aggregate_id: Uuid, event: &Self::Event) -> Result<Self, Self::Error> {
        match event {
            OrderEvent::Placed(e) => Ok(Self {
                id: aggregate_id,
                version: 0,
                order_no: e.order_no.clone(),
                client_id: e.client_id,
                due_date: e.due_date,
                gst_rate: e.gst_rate,
                ledger: QuantityLedger::new(&e.lines),
                dispatches: Vec::new(),
                created_at: e.placed_at,
                updated_at: e.placed_at,
            }),
            _ => Err(OrderError::NotInitialized),
        }
    }

    fn apply_event(&mut self, event: &Self::Event) -> Result<(), Self::Error> {
        match event {
            OrderEvent::Placed(_) => Err(OrderError::AlreadyPlaced),
            OrderEvent::Dispatched(e) => {
                self.ledger
                    .apply_deductions(&e.lines)
                    .map_err(OrderError::LinesRejected)?;
                self.dispatches.push(DispatchEntry {
                    dispatch_id: e.dispatch_id,
                    sequence: e.sequence,
                    lines: e.lines.clone(),
                    idempotency_key: e.idempotency_key.clone(),
                    rolled_back: false,
                });
                self.updated_at = e.dispatched_at;
                Ok(())
            }
            OrderEvent::DispatchRolledBack(e) => {
                let entry = self
                    .dispatches
                    .iter_mut()
                    .find(|d| d.dispatch_id == e.dispatch_id && !d.rolled_back)
                    .ok_or(OrderError::UnknownDispatch(e.dispatch_id))?;
                entry.rolled_back = true;

                let restored: Vec<(Uuid, Decimal)> =
                    entry.lines.iter().map(|l| (l.product_id, l.quantity)).collect();
                self.ledger.restore(&restored);
                self.updated_at = e.rolled_back_at;
                Ok(())
            }
        }
    }

    fn handle_command(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OrderCommand::PlaceOrder { .. } => Err(OrderError::AlreadyPlaced),

            OrderCommand::DispatchLines { dispatch_id, lines, metadata, idempotency_key } => {
                if lines.is_empty() {
                    return Err(OrderError::EmptyDispatch);
                }

                if let Some(key) = idempotency_key {
                    if let Some(previous) = self.committed_with_key(key) {
                        if previous.lines == *lines {
                            return Err(OrderError::AlreadyCommitted {
                                key: key.clone(),
                                dispatch_id: previous.dispatch_id,
                            });
                        }
                        return Err(OrderError::IdempotencyKeyReused(key.clone()));
                    }
                }

                self.ledger
                    .check_deductions(lines)
                    .map_err(OrderError::LinesRejected)?;

                let sequence = self.active_dispatches().count() as u32 + 1;

                Ok(vec![OrderEvent::Dispatched(OrderDispatched {
                    dispatch_id: *dispatch_id,
                    sequence,
                    lines: lines.clone(),
                    metadata: metadata.clone(),
                    idempotency_key: idempotency_key.clone(),
                    dispatched_at: Utc::now(),
                })])
            }

            OrderCommand::RollBackDispatch { dispatch_id, reason } => {
                if !self.active_dispatches().any(|d| d.dispatch_id == *dispatch_id) {
                    return Err(OrderError::UnknownDispatch(*dispatch_id));
                }

                Ok(vec![OrderEvent::DispatchRolledBack(DispatchRolledBack {
                    dispatch_id: *dispatch_id,
                    reason: reason.clone(),
                    rolled_back_at: Utc::now(),
                })])
            }
        }
    }

    fn aggregate_id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn set_version(&mut self, version: i64) {
        self.version = version;
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
