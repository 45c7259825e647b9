// ============================================================================
// Event Sourcing Infrastructure
// ============================================================================
//
// Aggregates, envelopes, and an append-only stream store whose appends
// write the transactional outbox in the same step. Nothing here knows
// about orders; see src/domain/.
//
// ============================================================================

mod core;
mod store;

pub use self::core::*;
pub use self::store::*;
