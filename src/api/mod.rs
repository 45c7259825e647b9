// ============================================================================
// HTTP API
// ============================================================================
//
//   POST /order                               create an order
//   GET  /order/all?page&limit                paginated order list
//   GET  /order/{orderId}                     order with per-line balances
//   POST /sub-order/atomic                    all-or-nothing dispatch
//   POST /sub-order/dispatch                  dispatch and render invoice
//   GET  /sub-order/invoices/{orderId}        dispatch history
//   GET  /sub-order/invoices/{dispatchId}/pdf invoice of a past dispatch
//   GET  /health                              aggregated component health
//
// ============================================================================

pub mod dto;
pub mod error;
mod handlers;

use std::sync::Arc;

use actix::Addr;
use actix_web::{web, App, HttpServer};

use crate::actors::HealthMonitorActor;
use crate::config::ServerSettings;
use crate::domain::dispatch::DispatchCoordinator;
use crate::messaging::InvoiceArchive;

pub use error::{ApiError, ApiResult};

/// Shared state of every handler
pub struct AppState {
    pub coordinator: Arc<DispatchCoordinator>,
    pub archive: Arc<InvoiceArchive>,
    pub health_monitor: Option<Addr<HealthMonitorActor>>,
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(handlers::json_error))
        .app_data(web::PathConfig::default().error_handler(handlers::path_error))
        .app_data(web::QueryConfig::default().error_handler(handlers::query_error))
        .service(
            web::scope("/order")
                .route("", web::post().to(handlers::create_order))
                .route("/all", web::get().to(handlers::list_orders))
                .route("/{order_id}", web::get().to(handlers::get_order)),
        )
        .service(
            web::scope("/sub-order")
                .route("/atomic", web::post().to(handlers::submit_atomic))
                .route("/dispatch", web::post().to(handlers::dispatch))
                .route("/invoices/{order_id}", web::get().to(handlers::dispatch_history))
                .route("/invoices/{dispatch_id}/pdf", web::get().to(handlers::invoice_document)),
        )
        .route("/health", web::get().to(handlers::health));
}

pub async fn run_server(state: AppState, settings: &ServerSettings) -> std::io::Result<()> {
    let state = web::Data::new(state);

    tracing::info!("🚀 Fulfillment API listening on http://{}:{}", settings.host, settings.port);

    HttpServer::new(move || App::new().app_data(state.clone()).configure(routes))
        .bind((settings.host.as_str(), settings.port))?
        .run()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actors::{HealthStatus, UpdateHealth};
    use crate::domain::dispatch::InMemoryDispatchRecordStore;
    use crate::domain::order::OrderCommandHandler;
    use crate::event_sourcing::EventStore;
    use crate::invoice::TextInvoiceRenderer;
    use crate::utils::{CircuitBreaker, CircuitBreakerConfig};
    use actix::Actor;
    use actix_web::http::StatusCode;
    use actix_web::test;
    use rust_decimal::Decimal;
    use serde_json::{json, Value};
    use std::str::FromStr;
    use std::time::Duration;
    use uuid::Uuid;

    fn state(health_monitor: Option<Addr<HealthMonitorActor>>) -> web::Data<AppState> {
        let orders = Arc::new(OrderCommandHandler::new(Arc::new(EventStore::new("Order", "order-events"))));
        let records = Arc::new(InMemoryDispatchRecordStore::new());
        let coordinator = Arc::new(DispatchCoordinator::new(
            orders.clone(),
            records.clone(),
            Duration::from_secs(5),
        ));
        let archive = Arc::new(InvoiceArchive::new(
            records,
            orders,
            Arc::new(TextInvoiceRenderer),
            CircuitBreaker::new("invoice_archive", CircuitBreakerConfig::default()),
        ));

        web::Data::new(AppState {
            coordinator,
            archive,
            health_monitor,
        })
    }

    fn decimal(value: &Value) -> Decimal {
        match value {
            Value::String(s) => Decimal::from_str(s).unwrap(),
            other => Decimal::from_str(&other.to_string()).unwrap(),
        }
    }

    fn order_body(order_no: &str, client_id: Uuid, products: &[(Uuid, i64)]) -> Value {
        let lines: Vec<Value> = products
            .iter()
            .map(|(product_id, quantity)| {
                json!({
                    "productId": product_id,
                    "orderedQuantity": quantity,
                    "unitType": "SQUARE_FEET",
                    "rate": "25.50"
                })
            })
            .collect();

        json!({
            "orderNo": order_no,
            "clientId": client_id,
            "dueDate": "2026-12-31",
            "gstRate": "18",
            "lines": lines
        })
    }

    macro_rules! app {
        ($state:expr) => {
            test::init_service(App::new().app_data($state.clone()).configure(routes)).await
        };
    }

    #[actix_web::test]
    async fn test_create_and_get_order() {
        let state = state(None);
        let app = app!(state);
        let (client_id, product_id) = (Uuid::new_v4(), Uuid::new_v4());

        let req = test::TestRequest::post()
            .uri("/order")
            .set_json(order_body("ORD-1", client_id, &[(product_id, 10)]))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created: Value = test::read_body_json(resp).await;
        assert_eq!(created["status"], "PENDING");

        let order_id = created["id"].as_str().unwrap();
        let req = test::TestRequest::get().uri(&format!("/order/{}", order_id)).to_request();
        let order: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(order["orderNo"], "ORD-1");
        assert_eq!(decimal(&order["lines"][0]["remainingQuantity"]), Decimal::from(10));
        assert_eq!(decimal(&order["totalAmount"]), Decimal::from(255));
    }

    #[actix_web::test]
    async fn test_duplicate_order_no_conflicts() {
        let state = state(None);
        let app = app!(state);
        let body = order_body("ORD-DUP", Uuid::new_v4(), &[(Uuid::new_v4(), 5)]);

        let first = test::TestRequest::post().uri("/order").set_json(&body).to_request();
        assert_eq!(test::call_service(&app, first).await.status(), StatusCode::CREATED);

        let second = test::TestRequest::post().uri("/order").set_json(&body).to_request();
        let resp = test::call_service(&app, second).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        let error: Value = test::read_body_json(resp).await;
        assert_eq!(error["error"], "CONFLICT");
    }

    #[actix_web::test]
    async fn test_list_orders_paginates() {
        let state = state(None);
        let app = app!(state);

        for n in 0..3 {
            let req = test::TestRequest::post()
                .uri("/order")
                .set_json(order_body(&format!("ORD-P{}", n), Uuid::new_v4(), &[(Uuid::new_v4(), 1)]))
                .to_request();
            test::call_service(&app, req).await;
        }

        let req = test::TestRequest::get().uri("/order/all?page=2&limit=2").to_request();
        let page: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(page["total"], 3);
        assert_eq!(page["page"], 2);
        assert_eq!(page["orders"].as_array().unwrap().len(), 1);
    }

    #[actix_web::test]
    async fn test_atomic_sub_order_all_or_nothing() {
        let state = state(None);
        let app = app!(state);
        let (client_id, first, second) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        let req = test::TestRequest::post()
            .uri("/order")
            .set_json(order_body("ORD-ATOM", client_id, &[(first, 10), (second, 5)]))
            .to_request();
        let order: Value = test::call_and_read_body_json(&app, req).await;
        let order_id = order["id"].as_str().unwrap().to_string();

        // second line exceeds its balance, so neither line commits
        let req = test::TestRequest::post()
            .uri("/sub-order/atomic")
            .set_json(json!({
                "orderNo": "ORD-ATOM",
                "orderId": order_id,
                "clientId": client_id,
                "subOrders": [
                    { "productId": first, "quantity": 4, "unitType": "SQUARE_FEET", "remainingQuantity": 10 },
                    { "productId": second, "quantity": 6, "unitType": "SQUARE_FEET", "remainingQuantity": 5 }
                ]
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body: Value = test::read_body_json(resp).await;
        let rejected = body["outcome"]["rejected"].as_array().unwrap();
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0]["productId"], second.to_string());
        assert_eq!(rejected[0]["reason"]["code"], "EXCEEDS_REMAINING");
        assert!(body["results"].as_array().unwrap().iter().all(|r| r["success"] == false));

        let req = test::TestRequest::get().uri(&format!("/order/{}", order_id)).to_request();
        let order: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(decimal(&order["lines"][0]["remainingQuantity"]), Decimal::from(10));
        assert_eq!(decimal(&order["lines"][1]["remainingQuantity"]), Decimal::from(5));

        let req = test::TestRequest::post()
            .uri("/sub-order/atomic")
            .set_json(json!({
                "orderNo": "ORD-ATOM",
                "orderId": order_id,
                "clientId": client_id,
                "subOrders": [
                    { "productId": first, "quantity": 4, "unitType": "SQUARE_FEET" },
                    { "productId": second, "quantity": 5, "unitType": "SQUARE_FEET" }
                ]
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: Value = test::read_body_json(resp).await;
        assert!(body["outcome"]["committed"]["invoiceNumber"].is_string());
        assert!(body["results"].as_array().unwrap().iter().all(|r| r["success"] == true));

        let req = test::TestRequest::get().uri(&format!("/order/{}", order_id)).to_request();
        let order: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(order["status"], "PARTIALLY_DISPATCHED");
    }

    #[actix_web::test]
    async fn test_atomic_sub_order_rejects_header_mismatch() {
        let state = state(None);
        let app = app!(state);
        let product_id = Uuid::new_v4();

        let req = test::TestRequest::post()
            .uri("/order")
            .set_json(order_body("ORD-HDR", Uuid::new_v4(), &[(product_id, 10)]))
            .to_request();
        let order: Value = test::call_and_read_body_json(&app, req).await;

        let req = test::TestRequest::post()
            .uri("/sub-order/atomic")
            .set_json(json!({
                "orderNo": "ORD-HDR",
                "orderId": order["id"],
                "clientId": Uuid::new_v4(),
                "subOrders": [{ "productId": product_id, "quantity": 1, "unitType": "SQUARE_FEET" }]
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let error: Value = test::read_body_json(resp).await;
        assert_eq!(error["error"], "VALIDATION_ERROR");
    }

    #[actix_web::test]
    async fn test_dispatch_returns_invoice_and_history() {
        let state = state(None);
        let app = app!(state);
        let product_id = Uuid::new_v4();

        let req = test::TestRequest::post()
            .uri("/order")
            .set_json(order_body("ORD-DSP", Uuid::new_v4(), &[(product_id, 10)]))
            .to_request();
        let order: Value = test::call_and_read_body_json(&app, req).await;
        let order_id = order["id"].as_str().unwrap().to_string();

        let req = test::TestRequest::post()
            .uri("/sub-order/dispatch")
            .set_json(json!({
                "orderId": order_id,
                "lines": [{ "productId": product_id, "quantity": 10, "unitType": "SQUARE_FEET" }],
                "consignee": { "name": "Acme Tiles" },
                "logistics": { "vehicleNumber": "KA-01-1234" },
                "applyGst": true
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let dispatch_id = resp.headers().get("X-Dispatch-Id").unwrap().to_str().unwrap().to_string();
        let invoice_number = resp.headers().get("X-Invoice-Number").unwrap().to_str().unwrap().to_string();
        let invoice = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();
        assert!(invoice.contains("TAX INVOICE"));
        assert!(invoice.contains("Acme Tiles"));

        let req = test::TestRequest::get()
            .uri(&format!("/sub-order/invoices/{}", order_id))
            .to_request();
        let history: Value = test::call_and_read_body_json(&app, req).await;
        let dispatches = history["dispatches"].as_array().unwrap();
        assert_eq!(dispatches.len(), 1);
        assert_eq!(dispatches[0]["id"], dispatch_id);
        assert_eq!(decimal(&dispatches[0]["lines"][0]["quantity"]), Decimal::from(10));

        let req = test::TestRequest::get()
            .uri(&format!("/sub-order/invoices/{}/pdf", dispatch_id))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers().get("X-Invoice-Number").unwrap().to_str().unwrap(), invoice_number);
        let regenerated = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();
        assert_eq!(regenerated, invoice);

        let req = test::TestRequest::get().uri(&format!("/order/{}", order_id)).to_request();
        let order: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(order["status"], "COMPLETED");
    }

    #[actix_web::test]
    async fn test_not_found_and_malformed_requests() {
        let state = state(None);
        let app = app!(state);

        let req = test::TestRequest::get().uri(&format!("/order/{}", Uuid::new_v4())).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::get()
            .uri(&format!("/sub-order/invoices/{}/pdf", Uuid::new_v4()))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::get().uri("/order/not-a-uuid").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let error: Value = test::read_body_json(resp).await;
        assert_eq!(error["error"], "BAD_REQUEST");

        let req = test::TestRequest::post()
            .uri("/sub-order/dispatch")
            .insert_header(("content-type", "application/json"))
            .set_payload("{\"orderId\": 42")
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::get().uri("/order/all?page=abc").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_health_reports_components() {
        let monitor = HealthMonitorActor::new(None).start();
        monitor
            .send(UpdateHealth {
                component: "dlq".to_string(),
                status: HealthStatus::Unhealthy("store down".into()),
                details: None,
            })
            .await
            .unwrap();

        let state = state(Some(monitor));
        let app = app!(state);

        let req = test::TestRequest::get().uri("/health").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "UNHEALTHY");
        assert_eq!(body["components"][0]["name"], "dlq");
    }
}
