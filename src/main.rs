use actix::prelude::*;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use order_fulfillment::actors::{GetHealthMonitor, Shutdown, SupervisorActor};
use order_fulfillment::api::{self, AppState};
use order_fulfillment::config::AppConfig;
use order_fulfillment::domain::dispatch::{DispatchCoordinator, InMemoryDispatchRecordStore};
use order_fulfillment::domain::order::{OrderCommandHandler, OrderEvent};
use order_fulfillment::event_sourcing::EventStore;
use order_fulfillment::invoice::TextInvoiceRenderer;
use order_fulfillment::messaging::InvoiceArchive;
use order_fulfillment::metrics::{self, Metrics};
use order_fulfillment::utils::CircuitBreaker;

#[actix::main]
async fn main() -> anyhow::Result<()> {
    // Default to INFO level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,order_fulfillment=debug"))
        )
        .init();

    tracing::info!("🚀 Starting Order Fulfillment Engine");

    // === 1. Configuration ===
    let config = AppConfig::load()?;
    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        lock_timeout_ms = config.dispatch.lock_timeout_ms,
        "Configuration loaded"
    );

    // === 2. Prometheus metrics ===
    let metrics = Arc::new(Metrics::new()?);
    tracing::info!("📊 Metrics registry created with {} metrics", metrics.registry().gather().len());

    if config.metrics.enabled {
        let metrics_registry = Arc::new(metrics.registry().clone());
        let host = config.server.host.clone();
        let port = config.metrics.port;
        std::thread::spawn(move || {
            let rt = match tokio::runtime::Runtime::new() {
                Ok(rt) => rt,
                Err(e) => {
                    tracing::error!("Metrics runtime error: {}", e);
                    return;
                }
            };
            rt.block_on(async {
                if let Err(e) = metrics::start_metrics_server(metrics_registry, host, port).await {
                    tracing::error!("Metrics server error: {}", e);
                }
            });
        });
    }

    // === 3. Ledger (event store + command handler) and dispatch records ===
    let event_store: Arc<EventStore<OrderEvent>> = Arc::new(EventStore::new("Order", "order-events"));
    let orders = Arc::new(OrderCommandHandler::new(event_store.clone()));
    let records = Arc::new(InMemoryDispatchRecordStore::new());

    let coordinator = Arc::new(
        DispatchCoordinator::new(orders.clone(), records.clone(), config.dispatch.lock_timeout())
            .with_metrics(metrics.clone()),
    );

    // === 4. Invoice archive behind a circuit breaker ===
    let circuit_breaker = CircuitBreaker::new("invoice_archive", config.circuit_breaker.clone())
        .with_metrics(metrics.clone());
    let archive = Arc::new(InvoiceArchive::new(
        records,
        orders,
        Arc::new(TextInvoiceRenderer),
        circuit_breaker,
    ));

    // === 5. Supervisor (health monitor, DLQ, outbox relay) ===
    tracing::info!("Starting supervisor actor");
    let supervisor = SupervisorActor::new(
        event_store,
        archive.clone(),
        Some(metrics.clone()),
        config.outbox.clone(),
    )
    .start();
    let health_monitor = supervisor.send(GetHealthMonitor).await?;

    // === 6. HTTP API ===
    let state = AppState {
        coordinator,
        archive,
        health_monitor,
    };

    tokio::select! {
        result = api::run_server(state, &config.server) => {
            if let Err(e) = result {
                tracing::error!("HTTP server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Ctrl-C received");
        }
    }

    supervisor.send(Shutdown).await?;
    tracing::info!("🎉 Shutdown complete");

    Ok(())
}
