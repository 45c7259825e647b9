// ============================================================================
// Event Sourcing Core - Generic Infrastructure Abstractions
// ============================================================================
//
// Reusable event sourcing infrastructure that works with any aggregate.
// No order or dispatch specific code lives here.
//
// ============================================================================

pub mod aggregate;
pub mod event;

pub use aggregate::Aggregate;
pub use event::{DomainEvent, EventEnvelope, NamedEvent, serialize_event, deserialize_event};
