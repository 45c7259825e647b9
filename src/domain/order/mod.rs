// ============================================================================
// Order Domain - Business Logic for Order Aggregate
// ============================================================================
//
// All Order-specific code:
// - Value objects (OrderLine, UnitType, DispatchLine, OrderStatus)
// - Quantity ledger (ordered vs. dispatched per line)
// - Status resolver (derived, never stored)
// - Events, commands and errors
// - Aggregate and command handler
//
// ============================================================================

pub mod value_objects;
pub mod ledger;
pub mod status;
pub mod events;
pub mod commands;
pub mod errors;
pub mod aggregate;
pub mod command_handler;

pub use value_objects::*;
pub use ledger::*;
pub use status::*;
pub use events::*;
pub use commands::*;
pub use errors::*;
pub use aggregate::*;
pub use command_handler::*;
