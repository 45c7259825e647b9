use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse};
use uuid::Uuid;

use crate::actors::{GetSystemHealth, HealthStatus};
use crate::domain::dispatch::{DispatchOutcome, SubmitDispatch};
use crate::error::FulfillmentError;

use super::dto::{
    AtomicSubOrderRequest, AtomicSubOrderResponse, CreateOrderRequest, DispatchHistory, DispatchRequest,
    HealthResponse, OrderPage, OrderView, PageQuery,
};
use super::error::{ApiError, ApiResult};
use super::AppState;

// ============================================================================
// Orders
// ============================================================================

pub async fn create_order(
    state: web::Data<AppState>,
    body: web::Json<CreateOrderRequest>,
) -> ApiResult<HttpResponse> {
    let order = state.coordinator.place_order(body.into_inner().into()).await?;
    Ok(HttpResponse::Created().json(OrderView::from(&order)))
}

pub async fn get_order(state: web::Data<AppState>, path: web::Path<Uuid>) -> ApiResult<HttpResponse> {
    let order = state.coordinator.order(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(OrderView::from(&order)))
}

pub async fn list_orders(state: web::Data<AppState>, query: web::Query<PageQuery>) -> ApiResult<HttpResponse> {
    let (page, limit) = query.resolve();
    let (orders, total) = state.coordinator.list_orders(page, limit).await?;

    Ok(HttpResponse::Ok().json(OrderPage {
        orders: orders.iter().map(OrderView::from).collect(),
        page,
        limit,
        total,
    }))
}

// ============================================================================
// Sub-orders
// ============================================================================

/// All-or-nothing dispatch with per-line attribution
pub async fn submit_atomic(
    state: web::Data<AppState>,
    body: web::Json<AtomicSubOrderRequest>,
) -> ApiResult<HttpResponse> {
    let request = body.into_inner();
    let order = state.coordinator.order(request.order_id).await?;

    if order.order_no != request.order_no.trim() || order.client_id != request.client_id {
        tracing::warn!(
            order_id = %request.order_id,
            order_no = %request.order_no,
            client_id = %request.client_id,
            "Sub-order header does not match the stored order"
        );
        return Err(FulfillmentError::validation(format!(
            "Header mismatch: orderNo/clientId do not belong to order {}",
            request.order_id
        ))
        .into());
    }

    for line in &request.sub_orders {
        let Some(claimed) = line.remaining_quantity else { continue };
        let actual = order.ledger.remaining(line.product_id);
        if actual != Some(claimed) {
            tracing::debug!(
                order_id = %request.order_id,
                product_id = %line.product_id,
                claimed = %claimed,
                actual = ?actual,
                "Client remaining quantity is stale"
            );
        }
    }

    let mut submit = SubmitDispatch::new(request.order_id, request.dispatch_lines());
    if let Some(key) = &request.idempotency_key {
        submit = submit.with_idempotency_key(key.clone());
    }

    let outcome = DispatchOutcome::from_result(state.coordinator.submit_dispatch(submit).await)?;
    let results = outcome.line_results(&request.product_ids());
    let status = if outcome.is_committed() {
        StatusCode::OK
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };

    Ok(HttpResponse::build(status).json(AtomicSubOrderResponse { outcome, results }))
}

/// Commit a dispatch and return its rendered invoice
pub async fn dispatch(state: web::Data<AppState>, body: web::Json<DispatchRequest>) -> ApiResult<HttpResponse> {
    let request = body.into_inner();

    let mut submit = SubmitDispatch::new(request.order_id, request.lines.clone()).with_metadata(request.metadata());
    if let Some(key) = request.idempotency_key {
        submit = submit.with_idempotency_key(key);
    }

    let batch = state.coordinator.submit_dispatch(submit).await?;
    let document = state.archive.renderer().render(&batch);

    Ok(HttpResponse::Created()
        .content_type(document.content_type)
        .insert_header(("X-Dispatch-Id", batch.id.to_string()))
        .insert_header(("X-Invoice-Number", document.invoice_number.clone()))
        .body(document.body))
}

pub async fn dispatch_history(state: web::Data<AppState>, path: web::Path<Uuid>) -> ApiResult<HttpResponse> {
    let order_id = path.into_inner();
    let dispatches = state.coordinator.dispatch_history(order_id).await?;
    Ok(HttpResponse::Ok().json(DispatchHistory { order_id, dispatches }))
}

/// Archived invoice when present, otherwise rendered from the record
pub async fn invoice_document(state: web::Data<AppState>, path: web::Path<Uuid>) -> ApiResult<HttpResponse> {
    let dispatch_id = path.into_inner();

    let document = match state.archive.document(dispatch_id) {
        Some(document) => document,
        None => {
            let batch = state.coordinator.dispatch(dispatch_id).await?;
            tracing::debug!(dispatch_id = %dispatch_id, "Invoice not archived yet, rendering on demand");
            state.archive.renderer().render(&batch)
        }
    };

    Ok(HttpResponse::Ok()
        .content_type(document.content_type)
        .insert_header(("X-Invoice-Number", document.invoice_number))
        .body(document.body))
}

// ============================================================================
// Health
// ============================================================================

pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    let Some(monitor) = &state.health_monitor else {
        return HttpResponse::Ok().json(serde_json::json!({ "status": "HEALTHY", "components": [] }));
    };

    match monitor.send(GetSystemHealth).await {
        Ok(health) => {
            let status = match health.overall_status {
                HealthStatus::Unhealthy(_) => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::OK,
            };
            HttpResponse::build(status).json(HealthResponse::from(&health))
        }
        Err(e) => {
            tracing::error!(error = %e, "Health monitor unreachable");
            HttpResponse::ServiceUnavailable().json(serde_json::json!({
                "status": "UNHEALTHY",
                "reason": "health monitor unreachable"
            }))
        }
    }
}

// ============================================================================
// Extractor errors
// ============================================================================

pub(super) fn json_error(err: actix_web::error::JsonPayloadError, _: &actix_web::HttpRequest) -> actix_web::Error {
    ApiError::BadRequest(err.to_string()).into()
}

pub(super) fn path_error(err: actix_web::error::PathError, _: &actix_web::HttpRequest) -> actix_web::Error {
    ApiError::BadRequest(err.to_string()).into()
}

pub(super) fn query_error(err: actix_web::error::QueryPayloadError, _: &actix_web::HttpRequest) -> actix_web::Error {
    ApiError::BadRequest(err.to_string()).into()
}
