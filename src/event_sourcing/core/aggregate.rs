use uuid::Uuid;
use anyhow::Result;
use super::event::EventEnvelope;

// ============================================================================
// Aggregate Root
// ============================================================================
//
// An aggregate never stores its state; it folds its own events. Commands are
// checked against the folded state and answered with new events, which the
// caller persists before applying.
//
// ============================================================================

pub trait Aggregate: Sized + Send + Sync {
    type Event;
    type Command;
    type Error;

    /// The stream's opening event creates the aggregate
    fn apply_first_event(aggregate_id: Uuid, event: &Self::Event) -> Result<Self, Self::Error>;

    fn apply_event(&mut self, event: &Self::Event) -> Result<(), Self::Error>;

    /// Decide, never mutate
    fn handle_command(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>;

    fn aggregate_id(&self) -> Uuid;

    /// Sequence number of the last applied event
    fn version(&self) -> i64;

    fn set_version(&mut self, version: i64);

    /// Rebuild from a stream. Sequence numbers must run 1, 2, 3, ... without gaps.
    fn load_from_events(events: Vec<EventEnvelope<Self::Event>>) -> Result<Self>
    where
        Self::Error: std::fmt::Display,
    {
        let mut envelopes = events.into_iter();
        let Some(first) = envelopes.next() else {
            anyhow::bail!("Cannot load an aggregate from an empty stream");
        };
        if first.sequence_number != 1 {
            anyhow::bail!(
                "Stream of {} starts at sequence {}",
                first.aggregate_id,
                first.sequence_number
            );
        }

        let mut aggregate = Self::apply_first_event(first.aggregate_id, &first.event_data)
            .map_err(|e| anyhow::anyhow!("{} rejected by {}: {}", first.event_type, first.aggregate_id, e))?;
        aggregate.set_version(1);

        for envelope in envelopes {
            let expected = aggregate.version() + 1;
            if envelope.sequence_number != expected {
                anyhow::bail!(
                    "Stream of {} skips from {} to {}",
                    envelope.aggregate_id,
                    aggregate.version(),
                    envelope.sequence_number
                );
            }

            aggregate
                .apply_event(&envelope.event_data)
                .map_err(|e| anyhow::anyhow!("{} #{} failed to apply: {}", envelope.event_type, expected, e))?;
            aggregate.set_version(expected);
        }

        Ok(aggregate)
    }
}
