// ============================================================================
// Dispatch Domain - Sub-Orders Against an Order
// ============================================================================
//
// - Dispatch batches and the tagged outcome returned to callers
// - Dispatch record store (append-only history per order)
// - Dispatch transaction coordinator (ledger + record, all or nothing)
//
// ============================================================================

pub mod batch;
pub mod record_store;
pub mod coordinator;

pub use batch::*;
pub use record_store::*;
pub use coordinator::*;
