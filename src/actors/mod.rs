// ============================================================================
// Actors Module
// ============================================================================
//
// Actor-based infrastructure for asynchronous, concurrent operations.
//
// Structure:
// - core/           - Health abstractions shared by every actor
// - infrastructure/ - Concrete infrastructure actors (Relay, DLQ, Health, Supervisor)
//
// Note: Domain logic (orders, dispatches) uses the command handler and the
//       dispatch coordinator, NOT actors. Actors are reserved for
//       infrastructure concerns only.
//
// ============================================================================

mod core;
mod infrastructure;

pub use self::core::{ComponentHealth, ComponentHealthView, HealthCheckable, HealthStatus};
pub use self::infrastructure::*;
