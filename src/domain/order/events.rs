use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event_sourcing::{DomainEvent, NamedEvent};
use super::value_objects::{DispatchLine, DispatchMetadata, OrderLine};

// ============================================================================
// Order Events - Domain Events for Order Aggregate
// ============================================================================

/// Order Event - Union type for all order events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    Placed(OrderPlaced),
    Dispatched(OrderDispatched),
    DispatchRolledBack(DispatchRolledBack),
}

impl DomainEvent for OrderEvent {
    fn event_type() -> &'static str { "OrderEvent" }
}

impl NamedEvent for OrderEvent {
    fn name(&self) -> &'static str {
        match self {
            OrderEvent::Placed(_) => OrderPlaced::event_type(),
            OrderEvent::Dispatched(_) => OrderDispatched::event_type(),
            OrderEvent::DispatchRolledBack(_) => DispatchRolledBack::event_type(),
        }
    }

    fn version(&self) -> i32 {
        match self {
            OrderEvent::Placed(_) => OrderPlaced::event_version(),
            OrderEvent::Dispatched(_) => OrderDispatched::event_version(),
            OrderEvent::DispatchRolledBack(_) => DispatchRolledBack::event_version(),
        }
    }
}

// ============================================================================
// Individual Event Types
// ============================================================================

/// Order Placed - lines and their quantities are fixed from here on
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct OrderPlaced {
    pub order_no: String,
    pub client_id: Uuid,
    pub due_date: Option<NaiveDate>,
    pub gst_rate: Decimal,
    pub lines: Vec<OrderLine>,
    pub placed_at: DateTime<Utc>,
}

impl DomainEvent for OrderPlaced {
    fn event_type() -> &'static str { "OrderPlaced" }
    fn event_version() -> i32 { 1 }
}

/// Order Dispatched - a sub-order deducted quantities from the ledger
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct OrderDispatched {
    pub dispatch_id: Uuid,
    pub sequence: u32,
    pub lines: Vec<DispatchLine>,
    pub metadata: DispatchMetadata,
    pub idempotency_key: Option<String>,
    pub dispatched_at: DateTime<Utc>,
}

impl DomainEvent for OrderDispatched {
    fn event_type() -> &'static str { "OrderDispatched" }
    fn event_version() -> i32 { 1 }
}

/// Dispatch Rolled Back - compensates a dispatch whose record could not be stored
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct DispatchRolledBack {
    pub dispatch_id: Uuid,
    pub reason: String,
    pub rolled_back_at: DateTime<Utc>,
}

impl DomainEvent for DispatchRolledBack {
    fn event_type() -> &'static str { "DispatchRolledBack" }
    fn event_version() -> i32 { 1 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names_follow_variants() {
        let event = OrderEvent::DispatchRolledBack(DispatchRolledBack {
            dispatch_id: Uuid::new_v4(),
            reason: "storage unavailable".to_string(),
            rolled_back_at: Utc::now(),
        });
        assert_eq!(event.name(), "DispatchRolledBack");
    }

    #[test]
    fn test_events_are_adjacently_tagged() {
        let event = OrderEvent::DispatchRolledBack(DispatchRolledBack {
            dispatch_id: Uuid::nil(),
            reason: "x".to_string(),
            rolled_back_at: Utc::now(),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "DispatchRolledBack");
        assert_eq!(json["data"]["reason"], "x");
    }
}
