use std::collections::HashMap;
use std::marker::PhantomData;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::event_sourcing::core::{Aggregate, DomainEvent, EventEnvelope, serialize_event};

// ============================================================================
// Generic Event Store - Repository for Events
// ============================================================================
//
// In-process event store that works with any event type.
//
// Responsibilities:
// 1. Append events to the per-aggregate stream (append-only)
// 2. Load event history for aggregates
// 3. Optimistic concurrency control on the stream version
// 4. Write outbox rows in the same append as the events
//
// Every append is applied under one write guard, so events, outbox rows and
// the stream version move together or not at all.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum EventStoreError {
    #[error("Concurrency conflict on {aggregate_id}: expected version {expected}, but current is {current}")]
    ConcurrencyConflict {
        aggregate_id: Uuid,
        expected: i64,
        current: i64,
    },

    #[error("Aggregate not found: {0}")]
    AggregateNotFound(Uuid),

    #[error("Cannot append empty event list")]
    EmptyAppend,

    #[error("Failed to serialize event: {0}")]
    Serialization(String),

    #[error("Failed to rebuild aggregate {aggregate_id}: {reason}")]
    Replay { aggregate_id: Uuid, reason: String },
}

/// Row waiting to be relayed to downstream consumers.
#[derive(Debug, Clone, Serialize)]
pub struct OutboxMessage {
    pub id: Uuid,
    pub aggregate_id: Uuid,
    pub aggregate_type: String,
    pub event_id: Uuid,
    pub event_type: String,
    pub event_version: i32,
    pub payload: String,
    pub topic: String,
    pub partition_key: String,
    pub correlation_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub attempts: i32,
}

struct EventStoreState<E> {
    streams: HashMap<Uuid, Vec<EventEnvelope<E>>>,
    // Stream creation order, used for listings.
    stream_order: Vec<Uuid>,
    outbox: Vec<OutboxMessage>,
}

pub struct EventStore<E: DomainEvent> {
    state: RwLock<EventStoreState<E>>,
    aggregate_type_name: String,  // e.g., "Order"
    topic_name: String,            // e.g., "order-events"
    _phantom: PhantomData<E>,
}

impl<E: DomainEvent> EventStore<E> {
    pub fn new(aggregate_type_name: &str, topic_name: &str) -> Self {
        Self {
            state: RwLock::new(EventStoreState {
                streams: HashMap::new(),
                stream_order: Vec::new(),
                outbox: Vec::new(),
            }),
            aggregate_type_name: aggregate_type_name.to_string(),
            topic_name: topic_name.to_string(),
            _phantom: PhantomData,
        }
    }

    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type_name
    }

    /// Append events to the event store.
    /// Returns the new version number after appending.
    pub async fn append_events(
        &self,
        aggregate_id: Uuid,
        expected_version: i64,
        events: Vec<EventEnvelope<E>>,
        publish_to_outbox: bool,
    ) -> Result<i64, EventStoreError> {
        if events.is_empty() {
            return Err(EventStoreError::EmptyAppend);
        }

        // Serialize before taking the guard; a bad payload must not leave a half-written stream.
        let mut outbox_rows = Vec::new();
        let mut new_version = expected_version;
        let mut stamped = Vec::with_capacity(events.len());

        for mut envelope in events {
            new_version += 1;
            envelope.aggregate_id = aggregate_id;
            envelope.sequence_number = new_version;

            if publish_to_outbox {
                let payload = serialize_event(&envelope.event_data)
                    .map_err(|e| EventStoreError::Serialization(e.to_string()))?;

                outbox_rows.push(OutboxMessage {
                    id: Uuid::new_v4(),
                    aggregate_id,
                    aggregate_type: self.aggregate_type_name.clone(),
                    event_id: envelope.event_id,
                    event_type: envelope.event_type.clone(),
                    event_version: envelope.event_version,
                    payload,
                    topic: self.topic_name.clone(),
                    partition_key: aggregate_id.to_string(),
                    correlation_id: envelope.correlation_id,
                    created_at: Utc::now(),
                    attempts: 0,
                });
            }

            stamped.push(envelope);
        }

        let mut state = self.state.write().await;

        let current_version = state
            .streams
            .get(&aggregate_id)
            .and_then(|stream| stream.last())
            .map(|last| last.sequence_number)
            .unwrap_or(0);

        if current_version != expected_version {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected: expected_version,
                current: current_version,
            });
        }

        let event_count = stamped.len();
        if !state.streams.contains_key(&aggregate_id) {
            state.stream_order.push(aggregate_id);
        }
        state.streams.entry(aggregate_id).or_default().extend(stamped);
        state.outbox.extend(outbox_rows);

        tracing::info!(
            aggregate_id = %aggregate_id,
            aggregate_type = %self.aggregate_type_name,
            new_version = new_version,
            event_count = event_count,
            "Appended events to event store"
        );

        Ok(new_version)
    }

    /// Load all events for an aggregate, in sequence order
    pub async fn load_events(&self, aggregate_id: Uuid) -> Vec<EventEnvelope<E>> {
        let state = self.state.read().await;
        let events = state.streams.get(&aggregate_id).cloned().unwrap_or_default();

        tracing::debug!("Loaded {} events for aggregate {}", events.len(), aggregate_id);
        events
    }

    /// Current version of the aggregate; 0 for an unknown stream
    pub async fn get_current_version(&self, aggregate_id: Uuid) -> i64 {
        let state = self.state.read().await;
        state
            .streams
            .get(&aggregate_id)
            .and_then(|stream| stream.last())
            .map(|last| last.sequence_number)
            .unwrap_or(0)
    }

    /// Rebuild an aggregate from its events
    pub async fn load_aggregate<A>(&self, aggregate_id: Uuid) -> Result<A, EventStoreError>
    where
        A: Aggregate<Event = E>,
        <A as Aggregate>::Error: std::fmt::Display,
    {
        let events = self.load_events(aggregate_id).await;

        if events.is_empty() {
            return Err(EventStoreError::AggregateNotFound(aggregate_id));
        }

        A::load_from_events(events).map_err(|e| EventStoreError::Replay {
            aggregate_id,
            reason: e.to_string(),
        })
    }

    pub async fn aggregate_exists(&self, aggregate_id: Uuid) -> bool {
        self.get_current_version(aggregate_id).await > 0
    }

    /// Aggregate ids in stream creation order
    pub async fn aggregate_ids(&self) -> Vec<Uuid> {
        self.state.read().await.stream_order.clone()
    }

    // ------------------------------------------------------------------------
    // Outbox access
    // ------------------------------------------------------------------------

    /// Oldest unpublished outbox rows, up to `limit`
    pub async fn pending_outbox(&self, limit: usize) -> Vec<OutboxMessage> {
        let state = self.state.read().await;
        state.outbox.iter().take(limit).cloned().collect()
    }

    pub async fn outbox_len(&self) -> usize {
        self.state.read().await.outbox.len()
    }

    /// Remove a row once it has been published or dead-lettered
    pub async fn remove_from_outbox(&self, message_id: Uuid) -> bool {
        let mut state = self.state.write().await;
        let before = state.outbox.len();
        state.outbox.retain(|row| row.id != message_id);
        before != state.outbox.len()
    }

    /// Count a failed relay attempt; returns the new attempt count
    pub async fn record_outbox_failure(&self, message_id: Uuid) -> Option<i32> {
        let mut state = self.state.write().await;
        state
            .outbox
            .iter_mut()
            .find(|row| row.id == message_id)
            .map(|row| {
                row.attempts += 1;
                row.attempts
            })
    }
}
