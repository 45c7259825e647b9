use std::collections::HashMap;
use std::sync::Arc;

use actix::prelude::*;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::actors::core::{ComponentHealth, HealthCheckable, HealthStatus};
use crate::metrics::Metrics;

use super::health_monitor::{HealthMonitorActor, UpdateHealth};

// ============================================================================
// Dead Letter Queue Actor
// ============================================================================
//
// Holds outbox messages the relay gave up on, for manual intervention.
// Any message here means an invoice was not archived.
//
// ============================================================================

pub struct DlqActor {
    messages: Vec<DlqMessage>,
    metrics: Option<Arc<Metrics>>,
    health_monitor: Option<Addr<HealthMonitorActor>>,
}

impl DlqActor {
    pub fn new(metrics: Option<Arc<Metrics>>) -> Self {
        Self {
            messages: Vec::new(),
            metrics,
            health_monitor: None,
        }
    }

    pub fn with_health_monitor(mut self, health_monitor: Addr<HealthMonitorActor>) -> Self {
        self.health_monitor = Some(health_monitor);
        self
    }

    fn report_health(&self) {
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

impl Actor for DlqActor {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        tracing::info!("DlqActor started - Dead Letter Queue ready");
        self.report_health();
    }
}

impl HealthCheckable for DlqActor {
    fn check_health(&self) -> ComponentHealth {
        let status = if self.messages.is_empty() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded(format!("{} message(s) awaiting intervention", self.messages.len()))
        };
        ComponentHealth::new(self.component_name(), status)
    }

    fn component_name(&self) -> &str {
        "dlq"
    }
}

// ============================================================================
// Messages
// ============================================================================

#[derive(Message, Debug, Clone)]
#[rtype(result = "()")]
pub struct AddToDlq {
    pub id: Uuid,
    pub aggregate_id: Uuid,
    pub event_type: String,
    pub payload: String,
    pub error_message: String,
    pub failure_count: i32,
    pub first_failed_at: DateTime<Utc>,
}

#[derive(Message)]
#[rtype(result = "Vec<DlqMessage>")]
pub struct GetDlqMessages {
    pub limit: usize,
}

#[derive(Message)]
#[rtype(result = "DlqStats")]
pub struct GetDlqStats;

#[derive(Debug, Clone)]
pub struct DlqMessage {
    pub id: Uuid,
    pub aggregate_id: Uuid,
    pub event_type: String,
    pub payload: String,
    pub error_message: String,
    pub failure_count: i32,
    pub first_failed_at: DateTime<Utc>,
    pub dead_lettered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct DlqStats {
    pub total_messages: usize,
    pub by_event_type: HashMap<String, usize>,
}

// ============================================================================
// Handlers
// ============================================================================

impl Handler<AddToDlq> for DlqActor {
    type Result = ();

    fn handle(&mut self, msg: AddToDlq, _: &mut Self::Context) {
        tracing::error!(
            event_id = %msg.id,
            event_type = %msg.event_type,
            aggregate_id = %msg.aggregate_id,
            error = %msg.error_message,
            failure_count = msg.failure_count,
            "💀 Adding message to Dead Letter Queue"
        );

        if let Some(metrics) = &self.metrics {
            metrics.record_dlq_message(&msg.event_type);
        }

        self.messages.push(DlqMessage {
            id: msg.id,
            aggregate_id: msg.aggregate_id,
            event_type: msg.event_type,
            payload: msg.payload,
            error_message: msg.error_message,
            failure_count: msg.failure_count,
            first_failed_at: msg.first_failed_at,
            dead_lettered_at: Utc::now(),
        });

        self.report_health();
    }
}

impl Handler<GetDlqMessages> for DlqActor {
    type Result = MessageResult<GetDlqMessages>;

    fn handle(&mut self, msg: GetDlqMessages, _: &mut Self::Context) -> Self::Result {
        MessageResult(self.messages.iter().take(msg.limit).cloned().collect())
    }
}

impl Handler<GetDlqStats> for DlqActor {
    type Result = MessageResult<GetDlqStats>;

    fn handle(&mut self, _msg: GetDlqStats, _: &mut Self::Context) -> Self::Result {
        let mut by_event_type = HashMap::new();
        for message in &self.messages {
            *by_event_type.entry(message.event_type.clone()).or_insert(0) += 1;
        }

        MessageResult(DlqStats {
            total_messages: self.messages.len(),
            by_event_type,
        })
    }
}
