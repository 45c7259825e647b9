use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use actix::prelude::*;

use crate::actors::core::{ComponentHealth, HealthCheckable, HealthStatus};
use crate::config::OutboxSettings;
use crate::domain::order::OrderEvent;
use crate::event_sourcing::{EventStore, OutboxMessage};
use crate::messaging::{EventPublisher, PublishError};
use crate::metrics::Metrics;
use crate::utils::{retry_on_transient, RetryResult};

use super::dlq::{AddToDlq, DlqActor};
use super::health_monitor::{HealthMonitorActor, UpdateHealth};

// ============================================================================
// Outbox Relay Actor - Drains the event store outbox into a publisher
// ============================================================================
//
// Each poll:
// 1. Take up to `batch_size` pending outbox messages, oldest first
// 2. Publish each with exponential-backoff retry
// 3. Remove published messages from the outbox
// 4. Count failed passes; dead-letter after `max_delivery_attempts`
//
// Messages of one order are published in order: once a message of an order
// fails, its later messages wait for the next poll. An open circuit ends the
// pass early.
//
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrainReport {
    pub published: usize,
    pub deferred: usize,
    pub dead_lettered: usize,
    pub last_error: Option<String>,
}

/// Everything a drain pass needs, cheap to clone into a future
#[derive(Clone)]
struct Relay {
    store: Arc<EventStore<OrderEvent>>,
    publisher: Arc<dyn EventPublisher>,
    dlq: Option<Addr<DlqActor>>,
    metrics: Option<Arc<Metrics>>,
    settings: OutboxSettings,
}

impl Relay {
    async fn drain(self) -> DrainReport {
        let mut report = DrainReport::default();
        let messages = self.store.pending_outbox(self.settings.batch_size).await;
        if messages.is_empty() {
            return report;
        }

        tracing::debug!(message_count = messages.len(), "📬 Draining outbox");

        let mut blocked = HashSet::new();
        for message in messages {
            if blocked.contains(&message.aggregate_id) {
                report.deferred += 1;
                continue;
            }

            match self.publish(&message).await {
                RetryResult::Success(()) => {
                    self.store.remove_from_outbox(message.id).await;
                    self.record_publish(&message.event_type, true);
                    report.published += 1;

                    tracing::info!(
                        event_id = %message.event_id,
                        event_type = %message.event_type,
                        aggregate_id = %message.aggregate_id,
                        "✅ Published outbox message"
                    );
                }
                RetryResult::Permanent(error) => {
                    self.record_publish(&message.event_type, false);
                    self.dead_letter(&message, &error, message.attempts + 1).await;
                    report.dead_lettered += 1;
                    report.last_error = Some(error.to_string());
                }
                RetryResult::Exhausted(PublishError::CircuitOpen(name)) => {
                    report.deferred += 1;
                    report.last_error = Some(format!("Circuit breaker '{}' is open", name));
                    tracing::warn!(event_id = %message.event_id, "Publisher circuit open, ending pass");
                    break;
                }
                RetryResult::Exhausted(error) => {
                    self.record_publish(&message.event_type, false);
                    let attempts = self.store.record_outbox_failure(message.id).await.unwrap_or(0);
                    report.last_error = Some(error.to_string());

                    if attempts >= self.settings.max_delivery_attempts {
                        self.dead_letter(&message, &error, attempts).await;
                        report.dead_lettered += 1;
                    } else {
                        tracing::warn!(
                            event_id = %message.event_id,
                            attempts,
                            error = %error,
                            "Outbox message deferred to next poll"
                        );
                        blocked.insert(message.aggregate_id);
                        report.deferred += 1;
                    }
                }
            }
        }

        report
    }

    async fn publish(&self, message: &OutboxMessage) -> RetryResult<(), PublishError> {
        let publisher = &self.publisher;
        let metrics = self.metrics.as_ref();
        let attempts = AtomicU32::new(0);
        let attempts_ref = &attempts;

        let result = retry_on_transient(&self.settings.retry, move |attempt| {
            attempts_ref.store(attempt, Ordering::Relaxed);
            if let Some(metrics) = metrics {
                metrics.record_retry_attempt(publisher.name(), attempt);
            }
            publisher.publish(message)
        })
        .await;

        if attempts.load(Ordering::Relaxed) > 1 {
            if let Some(metrics) = &self.metrics {
                metrics.record_retry_outcome(self.publisher.name(), matches!(result, RetryResult::Success(_)));
            }
        }

        result
    }

    async fn dead_letter(&self, message: &OutboxMessage, error: &PublishError, failure_count: i32) {
        self.store.remove_from_outbox(message.id).await;

        let Some(dlq) = &self.dlq else {
            tracing::error!(
                event_id = %message.event_id,
                error = %error,
                "Dropping undeliverable outbox message, no DLQ configured"
            );
            return;
        };

        let entry = AddToDlq {
            id: message.event_id,
            aggregate_id: message.aggregate_id,
            event_type: message.event_type.clone(),
            payload: message.payload.clone(),
            error_message: error.to_string(),
            failure_count,
            first_failed_at: message.created_at,
        };
        if let Err(e) = dlq.send(entry).await {
            tracing::error!(event_id = %message.event_id, error = %e, "Failed to reach DLQ actor");
        }
    }

    fn record_publish(&self, event_type: &str, success: bool) {
        if let Some(metrics) = &self.metrics {
            metrics.record_outbox_publish(event_type, success);
        }
    }
}

pub struct OutboxRelayActor {
    relay: Relay,
    health_monitor: Option<Addr<HealthMonitorActor>>,
    draining: bool,
    last_report: DrainReport,
}

impl OutboxRelayActor {
    pub fn new(
        store: Arc<EventStore<OrderEvent>>,
        publisher: Arc<dyn EventPublisher>,
        settings: OutboxSettings,
    ) -> Self {
        Self {
            relay: Relay {
                store,
                publisher,
                dlq: None,
                metrics: None,
                settings,
            },
            health_monitor: None,
            draining: false,
            last_report: DrainReport::default(),
        }
    }

    pub fn with_dlq(mut self, dlq: Addr<DlqActor>) -> Self {
        self.relay.dlq = Some(dlq);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.relay.metrics = Some(metrics);
        self
    }

    pub fn with_health_monitor(mut self, health_monitor: Addr<HealthMonitorActor>) -> Self {
        self.health_monitor = Some(health_monitor);
        self
    }

    fn poll(&mut self, ctx: &mut Context<Self>) {
        if self.draining {
            return;
        }
        self.draining = true;

        let drain = self.relay.clone().drain();
        ctx.spawn(drain.into_actor(self).map(|report, act, _ctx| {
            act.draining = false;
            act.finish(report);
        }));
    }

    fn finish(&mut self, report: DrainReport) {
        self.last_report = report;

        if let Some(monitor) = &self.health_monitor {
            let health = self.check_health();
            monitor.do_send(UpdateHealth {
                component: health.name,
                status: health.status,
                details: health.details,
            });
        }
    }
}

impl HealthCheckable for OutboxRelayActor {
    fn check_health(&self) -> ComponentHealth {
        let report = &self.last_report;
        let status = match &report.last_error {
            Some(error) if report.published == 0 => HealthStatus::Degraded(error.clone()),
            _ => HealthStatus::Healthy,
        };

        ComponentHealth::new(self.component_name(), status).with_details(format!(
            "published {}, deferred {}, dead-lettered {} in last pass",
            report.published, report.deferred, report.dead_lettered
        ))
    }

    fn component_name(&self) -> &str {
        "outbox_relay"
    }
}

impl Actor for OutboxRelayActor {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!(
            publisher = %self.relay.publisher.name(),
            poll_interval_ms = self.relay.settings.poll_interval_ms,
            "🔄 OutboxRelayActor started"
        );

        self.finish(DrainReport::default());
        ctx.run_interval(self.relay.settings.poll_interval(), |act, ctx| act.poll(ctx));
    }

    fn stopped(&mut self, _: &mut Self::Context) {
        tracing::info!("🛑 OutboxRelayActor stopped");
    }
}

// ============================================================================
// Messages
// ============================================================================

/// Run one drain pass now and report what it did
#[derive(Message)]
#[rtype(result = "DrainReport")]
pub struct DrainOutbox;

impl Handler<DrainOutbox> for OutboxRelayActor {
    type Result = ResponseActFuture<Self, DrainReport>;

    fn handle(&mut self, _msg: DrainOutbox, _ctx: &mut Self::Context) -> Self::Result {
        let drain = self.relay.clone().drain();
        Box::pin(drain.into_actor(self).map(|report, act, _ctx| {
            act.finish(report.clone());
            report
        }))
    }
}
