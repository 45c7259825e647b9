// ============================================================================
// Infrastructure Actors
// ============================================================================
//
// Reusable infrastructure actors for system concerns:
// - Outbox relay (event store outbox → publisher)
// - Dead letter queue
// - Health monitoring
// - Supervision
//
// ============================================================================

mod dlq;
mod health_monitor;
mod outbox_relay;
mod supervisor;

pub use dlq::{AddToDlq, DlqActor, DlqMessage, DlqStats, GetDlqMessages, GetDlqStats};
pub use health_monitor::{GetSystemHealth, HealthMonitorActor, SystemHealth, UpdateHealth};
pub use outbox_relay::{DrainOutbox, DrainReport, OutboxRelayActor};
pub use supervisor::{GetHealthMonitor, Shutdown, SupervisorActor};
