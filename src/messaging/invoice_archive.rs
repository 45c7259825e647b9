use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use crate::domain::dispatch::{DispatchRecordStore, RecordStoreError};
use crate::domain::order::{OrderCommandHandler, OrderEvent};
use crate::event_sourcing::{deserialize_event, OutboxMessage};
use crate::invoice::{InvoiceDocument, InvoiceRenderer};
use crate::utils::{CircuitBreaker, CircuitBreakerError, CircuitState};

use super::publisher::{EventPublisher, PublishError};

// ============================================================================
// Invoice Archive
// ============================================================================
//
// Consumes dispatch events from the outbox:
// - OrderDispatched: render the invoice of the recorded batch and keep it
// - DispatchRolledBack: drop any archived invoice of that batch
//
// A Dispatched event can reach the archive before its record is appended,
// or for a dispatch that was rolled back. The first case is retried, the
// second is acknowledged without archiving anything.
//
// ============================================================================

pub struct InvoiceArchive {
    records: Arc<dyn DispatchRecordStore>,
    orders: Arc<OrderCommandHandler>,
    renderer: Arc<dyn InvoiceRenderer>,
    documents: DashMap<Uuid, InvoiceDocument>,
    circuit_breaker: CircuitBreaker,
}

impl InvoiceArchive {
    pub fn new(
        records: Arc<dyn DispatchRecordStore>,
        orders: Arc<OrderCommandHandler>,
        renderer: Arc<dyn InvoiceRenderer>,
        circuit_breaker: CircuitBreaker,
    ) -> Self {
        Self {
            records,
            orders,
            renderer,
            documents: DashMap::new(),
            circuit_breaker,
        }
    }

    /// Archived invoice of a dispatch, if it was rendered already
    pub fn document(&self, dispatch_id: Uuid) -> Option<InvoiceDocument> {
        self.documents.get(&dispatch_id).map(|doc| doc.clone())
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn renderer(&self) -> &Arc<dyn InvoiceRenderer> {
        &self.renderer
    }

    async fn archive(&self, order_id: Uuid, dispatch_id: Uuid) -> Result<(), PublishError> {
        match self.records.get_by_id(dispatch_id).await {
            Ok(batch) => {
                let document = self.renderer.render(&batch);
                tracing::debug!(
                    dispatch_id = %dispatch_id,
                    invoice_number = %document.invoice_number,
                    "Invoice archived"
                );
                self.documents.insert(dispatch_id, document);
                Ok(())
            }
            Err(RecordStoreError::NotFound(_)) => {
                let order = self
                    .orders
                    .load(order_id)
                    .await
                    .map_err(|e| PublishError::Unavailable(e.to_string()))?;

                let rolled_back = order
                    .dispatches
                    .iter()
                    .any(|d| d.dispatch_id == dispatch_id && d.rolled_back);
                if rolled_back {
                    tracing::debug!(dispatch_id = %dispatch_id, "Dispatch was rolled back, nothing to archive");
                    return Ok(());
                }

                Err(PublishError::Unavailable(format!("Dispatch {} not recorded yet", dispatch_id)))
            }
            Err(e) => Err(PublishError::Unavailable(e.to_string())),
        }
    }
}

#[async_trait]
impl EventPublisher for InvoiceArchive {
    fn name(&self) -> &str {
        "invoice_archive"
    }

    async fn publish(&self, message: &OutboxMessage) -> Result<(), PublishError> {
        let event: OrderEvent = deserialize_event(&message.payload)
            .map_err(|e| PublishError::Rejected(format!("Undecodable payload: {}", e)))?;

        let result = self
            .circuit_breaker
            .call(async {
                match &event {
                    OrderEvent::Dispatched(e) => self.archive(message.aggregate_id, e.dispatch_id).await,
                    OrderEvent::DispatchRolledBack(e) => {
                        if self.documents.remove(&e.dispatch_id).is_some() {
                            tracing::info!(dispatch_id = %e.dispatch_id, "Archived invoice evicted");
                        }
                        Ok(())
                    }
                    OrderEvent::Placed(_) => Ok(()),
                }
            })
            .await;

        match result {
            Ok(()) => Ok(()),
            Err(CircuitBreakerError::CircuitOpen(name)) => {
                tracing::error!(event_id = %message.event_id, "Circuit breaker open, invoice archive unavailable");
                Err(PublishError::CircuitOpen(name))
            }
            Err(CircuitBreakerError::OperationFailed(e)) => Err(e),
        }
    }

    async fn is_degraded(&self) -> bool {
        self.circuit_breaker.state().await != CircuitState::Closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::dispatch::{DispatchBatch, InMemoryDispatchRecordStore};
    use crate::domain::order::{DispatchLine, DispatchMetadata, OrderCommand, OrderLine, UnitType};
    use crate::event_sourcing::EventStore;
    use crate::invoice::TextInvoiceRenderer;
    use crate::utils::CircuitBreakerConfig;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    struct Fixture {
        archive: InvoiceArchive,
        orders: Arc<OrderCommandHandler>,
        records: Arc<InMemoryDispatchRecordStore>,
    }

    fn fixture() -> Fixture {
        let orders = Arc::new(OrderCommandHandler::new(Arc::new(EventStore::new("Order", "order-events"))));
        let records = Arc::new(InMemoryDispatchRecordStore::new());
        let archive = InvoiceArchive::new(
            records.clone(),
            orders.clone(),
            Arc::new(TextInvoiceRenderer),
            CircuitBreaker::new(
                "invoice_archive",
                CircuitBreakerConfig {
                    failure_threshold: 2,
                    timeout: Duration::from_secs(60),
                    success_threshold: 1,
                },
            ),
        );
        Fixture { archive, orders, records }
    }

    /// Place an order and dispatch from it; returns the outbox message of the dispatch
    async fn dispatch(fixture: &Fixture, record: bool) -> (OutboxMessage, Uuid) {
        let order = fixture
            .orders
            .place_order(
                OrderCommand::PlaceOrder {
                    order_no: format!("INV-{}", Uuid::new_v4()),
                    client_id: Uuid::new_v4(),
                    due_date: None,
                    gst_rate: dec!(5),
                    lines: vec![OrderLine {
                        product_id: Uuid::new_v4(),
                        ordered_quantity: dec!(10),
                        unit_type: UnitType::Set,
                        rate: dec!(100),
                        discount: None,
                        cash_rate: None,
                    }],
                },
                Uuid::new_v4(),
            )
            .await
            .unwrap();

        let dispatch_id = Uuid::new_v4();
        let outcome = fixture
            .orders
            .handle(
                order.id,
                OrderCommand::DispatchLines {
                    dispatch_id,
                    lines: vec![DispatchLine::new(order.ledger.lines()[0].product_id(), dec!(2))],
                    metadata: DispatchMetadata::default(),
                    idempotency_key: None,
                },
                Uuid::new_v4(),
            )
            .await
            .unwrap();

        if record {
            let OrderEvent::Dispatched(event) = &outcome.events[0] else {
                panic!("expected dispatch event");
            };
            let batch = DispatchBatch::from_commit(&outcome.aggregate, event);
            fixture.records.append(order.id, batch).await.unwrap();
        }

        let message = fixture
            .orders
            .event_store()
            .pending_outbox(10)
            .await
            .into_iter()
            .find(|m| m.event_type == "OrderDispatched" && m.aggregate_id == order.id)
            .unwrap();
        (message, dispatch_id)
    }

    #[tokio::test]
    async fn test_dispatch_event_archives_invoice() {
        let fixture = fixture();
        let (message, dispatch_id) = dispatch(&fixture, true).await;

        fixture.archive.publish(&message).await.unwrap();

        let document = fixture.archive.document(dispatch_id).unwrap();
        assert!(document.invoice_number.ends_with("/1"));
        assert_eq!(fixture.archive.len(), 1);
    }

    #[tokio::test]
    async fn test_unrecorded_dispatch_is_retryable() {
        let fixture = fixture();
        let (message, _) = dispatch(&fixture, false).await;

        let result = fixture.archive.publish(&message).await;
        assert!(matches!(result, Err(PublishError::Unavailable(_))));
        assert!(fixture.archive.is_empty());
    }

    #[tokio::test]
    async fn test_bad_payload_is_rejected() {
        let fixture = fixture();
        let (mut message, _) = dispatch(&fixture, true).await;
        message.payload = "{not json".to_string();

        let result = fixture.archive.publish(&message).await;
        assert!(matches!(result, Err(PublishError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_repeated_failures_open_the_circuit() {
        let fixture = fixture();
        let (message, _) = dispatch(&fixture, false).await;

        let _ = fixture.archive.publish(&message).await;
        let _ = fixture.archive.publish(&message).await;
        assert!(fixture.archive.is_degraded().await);

        let result = fixture.archive.publish(&message).await;
        assert!(matches!(result, Err(PublishError::CircuitOpen(_))));
    }
}
