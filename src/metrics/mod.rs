mod server;

use prometheus::core::Collector;
use prometheus::{Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry};

pub use server::start_metrics_server;

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Provides metrics for:
// - Dispatch submissions (outcome, rejection reasons, latency, lock wait)
// - Ledger rollbacks after record store failures
// - Outbox relay throughput and failures
// - Retry attempts and outcomes
// - Dead Letter Queue statistics
// - Circuit breaker state transitions
//
// All metrics are registered with Prometheus and can be scraped via /metrics
// ============================================================================

pub struct Metrics {
    registry: Registry,

    // Dispatch Metrics
    pub dispatch_submissions: IntCounterVec,
    pub dispatch_rejected_lines: IntCounterVec,
    pub dispatch_duration: HistogramVec,
    pub lock_wait_duration: Histogram,
    pub ledger_rollbacks: IntCounter,

    // Outbox Metrics
    pub outbox_published: IntCounterVec,
    pub outbox_failed: IntCounterVec,

    // Retry Metrics
    pub retry_attempts_total: IntCounterVec,
    pub retry_success: IntCounterVec,
    pub retry_failure: IntCounterVec,

    // DLQ Metrics
    pub dlq_messages_total: IntCounter,
    pub dlq_messages_by_event_type: IntCounterVec,

    // Circuit Breaker Metrics
    pub circuit_breaker_state: IntGauge,
    pub circuit_breaker_transitions: IntCounterVec,
}

/// Register a collector and hand back the clone the struct keeps
fn register<C>(registry: &Registry, collector: C) -> prometheus::Result<C>
where
    C: Collector + Clone + 'static,
{
    registry.register(Box::new(collector.clone()))?;
    Ok(collector)
}

fn counter_vec(registry: &Registry, name: &str, help: &str, labels: &[&str]) -> prometheus::Result<IntCounterVec> {
    register(registry, IntCounterVec::new(Opts::new(name, help), labels)?)
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();
        let r = &registry;

        let metrics = Self {
            dispatch_submissions: counter_vec(r, "dispatch_submissions_total", "Dispatch submissions by outcome", &["outcome"])?,
            dispatch_rejected_lines: counter_vec(
                r,
                "dispatch_rejected_lines_total",
                "Rejected dispatch lines by reason",
                &["reason"],
            )?,
            dispatch_duration: register(
                r,
                HistogramVec::new(
                    HistogramOpts::new("dispatch_duration_seconds", "Dispatch submission duration")
                        .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
                    &["outcome"],
                )?,
            )?,
            lock_wait_duration: register(
                r,
                Histogram::with_opts(
                    HistogramOpts::new("order_lock_wait_seconds", "Time spent waiting for an order lock")
                        .buckets(vec![0.0001, 0.001, 0.01, 0.1, 1.0, 5.0]),
                )?,
            )?,
            ledger_rollbacks: register(
                r,
                IntCounter::new(
                    "ledger_rollbacks_total",
                    "Dispatches rolled back after the record could not be stored",
                )?,
            )?,

            outbox_published: counter_vec(r, "outbox_published_total", "Outbox messages published", &["event_type"])?,
            outbox_failed: counter_vec(
                r,
                "outbox_failed_total",
                "Outbox messages that failed publishing",
                &["event_type", "reason"],
            )?,

            retry_attempts_total: counter_vec(r, "retry_attempts_total", "Publish attempts by try number", &["operation", "attempt"])?,
            retry_success: counter_vec(r, "retry_success_total", "Publishes that succeeded after a retry", &["operation"])?,
            retry_failure: counter_vec(r, "retry_failure_total", "Publishes that failed after retrying", &["operation"])?,

            dlq_messages_total: register(r, IntCounter::new("dlq_messages_total", "Messages dead-lettered")?)?,
            dlq_messages_by_event_type: counter_vec(
                r,
                "dlq_messages_by_event_type",
                "Dead-lettered messages by event type",
                &["event_type"],
            )?,

            circuit_breaker_state: register(
                r,
                IntGauge::new("circuit_breaker_state", "Publisher circuit (0=Closed, 1=Open, 2=HalfOpen)")?,
            )?,
            circuit_breaker_transitions: counter_vec(
                r,
                "circuit_breaker_transitions_total",
                "Circuit breaker state transitions",
                &["from_state", "to_state"],
            )?,

            registry,
        };

        Ok(metrics)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record the outcome of one dispatch submission
    pub fn record_dispatch(&self, outcome: &str, duration_secs: f64) {
        self.dispatch_submissions.with_label_values(&[outcome]).inc();
        self.dispatch_duration.with_label_values(&[outcome]).observe(duration_secs);
    }

    pub fn record_rejected_line(&self, reason: &str) {
        self.dispatch_rejected_lines.with_label_values(&[reason]).inc();
    }

    pub fn record_lock_wait(&self, duration_secs: f64) {
        self.lock_wait_duration.observe(duration_secs);
    }

    pub fn record_rollback(&self) {
        self.ledger_rollbacks.inc();
    }

    pub fn record_outbox_publish(&self, event_type: &str, success: bool) {
        if success {
            self.outbox_published.with_label_values(&[event_type]).inc();
        } else {
            self.outbox_failed.with_label_values(&[event_type, "publish_error"]).inc();
        }
    }

    pub fn record_retry_attempt(&self, operation: &str, attempt: u32) {
        self.retry_attempts_total.with_label_values(&[operation, &attempt.to_string()]).inc();
    }

    /// Only called for operations that needed more than one attempt
    pub fn record_retry_outcome(&self, operation: &str, success: bool) {
        if success {
            self.retry_success.with_label_values(&[operation]).inc();
        } else {
            self.retry_failure.with_label_values(&[operation]).inc();
        }
    }

    pub fn record_dlq_message(&self, event_type: &str) {
        self.dlq_messages_total.inc();
        self.dlq_messages_by_event_type.with_label_values(&[event_type]).inc();
    }

    /// 0 closed, 1 open, 2 half-open
    pub fn update_circuit_breaker_state(&self, state: u8) {
        self.circuit_breaker_state.set(state as i64);
    }

    pub fn record_circuit_breaker_transition(&self, from_state: &str, to_state: &str) {
        self.circuit_breaker_transitions.with_label_values(&[from_state, to_state]).inc();
    }
}
