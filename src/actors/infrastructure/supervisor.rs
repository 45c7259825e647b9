use std::sync::Arc;
use std::time::Duration;

use actix::prelude::*;

use crate::actors::core::HealthStatus;
use crate::config::OutboxSettings;
use crate::domain::order::OrderEvent;
use crate::event_sourcing::EventStore;
use crate::messaging::EventPublisher;
use crate::metrics::Metrics;

use super::{DlqActor, DrainOutbox, GetSystemHealth, HealthMonitorActor, OutboxRelayActor};

// ============================================================================
// Supervisor Actor - Orchestrates all infrastructure actors
// ============================================================================
//
// Responsibilities:
// - Starts the child actors and wires them together
// - Runs a periodic system health check
// - Coordinates graceful shutdown (final outbox drain, then stop)
//
// Actor Hierarchy:
//   SupervisorActor
//   ├── HealthMonitorActor
//   ├── DlqActor
//   └── OutboxRelayActor
//
// ============================================================================

const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(30);

pub struct SupervisorActor {
    store: Arc<EventStore<OrderEvent>>,
    publisher: Arc<dyn EventPublisher>,
    metrics: Option<Arc<Metrics>>,
    settings: OutboxSettings,
    health_monitor: Option<Addr<HealthMonitorActor>>,
    dlq_actor: Option<Addr<DlqActor>>,
    outbox_relay: Option<Addr<OutboxRelayActor>>,
}

impl SupervisorActor {
    pub fn new(
        store: Arc<EventStore<OrderEvent>>,
        publisher: Arc<dyn EventPublisher>,
        metrics: Option<Arc<Metrics>>,
        settings: OutboxSettings,
    ) -> Self {
        Self {
            store,
            publisher,
            metrics,
            settings,
            health_monitor: None,
            dlq_actor: None,
            outbox_relay: None,
        }
    }

    fn start_child_actors(&mut self) {
        tracing::info!("Starting supervised child actors");

        let health_monitor = HealthMonitorActor::new(Some(self.publisher.clone())).start();
        self.health_monitor = Some(health_monitor.clone());

        let dlq_actor = DlqActor::new(self.metrics.clone())
            .with_health_monitor(health_monitor.clone())
            .start();
        self.dlq_actor = Some(dlq_actor.clone());

        let mut relay = OutboxRelayActor::new(self.store.clone(), self.publisher.clone(), self.settings.clone())
            .with_dlq(dlq_actor)
            .with_health_monitor(health_monitor);
        if let Some(metrics) = &self.metrics {
            relay = relay.with_metrics(metrics.clone());
        }
        self.outbox_relay = Some(relay.start());

        tracing::info!("✅ All supervised actors started successfully");
    }
}

impl Actor for SupervisorActor {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!("🎯 SupervisorActor started");
        self.start_child_actors();

        ctx.run_interval(HEALTH_CHECK_INTERVAL, |act, _ctx| {
            let Some(health_monitor) = act.health_monitor.clone() else { return };
            actix::spawn(async move {
                match health_monitor.send(GetSystemHealth).await {
                    Ok(health) => match health.overall_status {
                        HealthStatus::Healthy => tracing::debug!("System health check: Healthy"),
                        HealthStatus::Degraded(ref msg) => {
                            tracing::warn!("System health check: Degraded - {}", msg)
                        }
                        HealthStatus::Unhealthy(ref msg) => {
                            tracing::error!("System health check: Unhealthy - {}", msg)
                        }
                    },
                    Err(e) => tracing::error!("Failed to get system health: {}", e),
                }
            });
        });
    }

    fn stopped(&mut self, _: &mut Self::Context) {
        tracing::info!("🛑 SupervisorActor stopped");
    }
}

// ============================================================================
// Messages
// ============================================================================

/// Health monitor address, for the HTTP health endpoint
#[derive(Message)]
#[rtype(result = "Option<Addr<HealthMonitorActor>>")]
pub struct GetHealthMonitor;

impl Handler<GetHealthMonitor> for SupervisorActor {
    type Result = Option<Addr<HealthMonitorActor>>;

    fn handle(&mut self, _msg: GetHealthMonitor, _: &mut Self::Context) -> Self::Result {
        self.health_monitor.clone()
    }
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Shutdown;

impl Handler<Shutdown> for SupervisorActor {
    type Result = ResponseActFuture<Self, ()>;

    fn handle(&mut self, _msg: Shutdown, _ctx: &mut Self::Context) -> Self::Result {
        tracing::info!("Received shutdown signal");
        let relay = self.outbox_relay.clone();

        Box::pin(
            async move {
                if let Some(relay) = relay {
                    match relay.send(DrainOutbox).await {
                        Ok(report) => tracing::info!(
                            published = report.published,
                            deferred = report.deferred,
                            "Final outbox drain complete"
                        ),
                        Err(e) => tracing::warn!(error = %e, "Final outbox drain skipped"),
                    }
                }
            }
            .into_actor(self)
            .map(|_, act, ctx| {
                if let Some(relay) = act.outbox_relay.take() {
                    relay.do_send(StopActor);
                }
                if let Some(dlq) = act.dlq_actor.take() {
                    dlq.do_send(StopActor);
                }
                if let Some(monitor) = act.health_monitor.take() {
                    monitor.do_send(StopActor);
                }
                ctx.stop();
            }),
        )
    }
}

/// Message to gracefully stop an actor
#[derive(Message)]
#[rtype(result = "()")]
pub struct StopActor;

impl Handler<StopActor> for OutboxRelayActor {
    type Result = ();

    fn handle(&mut self, _: StopActor, ctx: &mut Self::Context) {
        tracing::info!("OutboxRelayActor received stop signal");
        ctx.stop();
    }
}

impl Handler<StopActor> for HealthMonitorActor {
    type Result = ();

    fn handle(&mut self, _: StopActor, ctx: &mut Self::Context) {
        tracing::info!("HealthMonitorActor received stop signal");
        ctx.stop();
    }
}

impl Handler<StopActor> for DlqActor {
    type Result = ();

    fn handle(&mut self, _: StopActor, ctx: &mut Self::Context) {
        tracing::info!("DlqActor received stop signal");
        ctx.stop();
    }
}
