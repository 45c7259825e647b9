use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use anyhow::Result;

// ============================================================================
// Event Envelope
// ============================================================================
//
// One persisted event of a stream. The envelope's type name and schema
// version come from the event itself, so a stream row can always be decoded
// without the aggregate in hand.
//
// ============================================================================

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct EventEnvelope<E> {
    pub event_id: Uuid,
    pub aggregate_id: Uuid,
    /// 1-based position in the aggregate's stream
    pub sequence_number: i64,

    pub event_type: String,
    pub event_version: i32,
    pub event_data: E,

    /// Shared by every event one request produced
    pub correlation_id: Uuid,
    pub recorded_at: DateTime<Utc>,
}

impl<E: NamedEvent> EventEnvelope<E> {
    pub fn new(aggregate_id: Uuid, sequence_number: i64, event_data: E, correlation_id: Uuid) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            aggregate_id,
            sequence_number,
            event_type: event_data.name().to_string(),
            event_version: event_data.version(),
            event_data,
            correlation_id,
            recorded_at: Utc::now(),
        }
    }
}

// ============================================================================
// Domain Event Trait
// ============================================================================

/// All domain events implement this trait to be used with the event store.
pub trait DomainEvent: Serialize + for<'de> Deserialize<'de> + Clone + Send + Sync {
    fn event_type() -> &'static str where Self: Sized;
    fn event_version() -> i32 where Self: Sized { 1 }
}

/// Events that carry several variants name each variant for envelopes and outbox rows.
pub trait NamedEvent {
    fn name(&self) -> &'static str;

    fn version(&self) -> i32 {
        1
    }
}

// ============================================================================
// Event Serialization Helpers
// ============================================================================

pub fn serialize_event<E: Serialize>(event: &E) -> Result<String> {
    Ok(serde_json::to_string(event)?)
}

pub fn deserialize_event<E: for<'de> Deserialize<'de>>(json: &str) -> Result<E> {
    Ok(serde_json::from_str(json)?)
}
