// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// The order aggregate owns the quantity ledger; the dispatch domain
// coordinates sub-orders against it. The order subdirectory has:
// - Value objects
// - Events
// - Commands
// - Errors
// - Aggregate implementation
// - Command handler
//
// This layer is completely separate from the event sourcing infrastructure.
//
// ============================================================================

pub mod order;
pub mod dispatch;
