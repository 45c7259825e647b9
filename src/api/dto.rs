use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::actors::{ComponentHealthView, SystemHealth};
use crate::domain::dispatch::{DispatchBatch, DispatchOutcome, LineResult};
use crate::domain::order::{
    DispatchLine, DispatchMetadata, LedgerLine, LogisticsDetails, OrderAggregate, OrderCommand, OrderLine,
    OrderStatus, Party, UnitType,
};

// ============================================================================
// Request / Response Bodies (camelCase JSON)
// ============================================================================

pub const DEFAULT_PAGE_LIMIT: usize = 10;
pub const MAX_PAGE_LIMIT: usize = 100;

// ----------------------------------------------------------------------------
// Orders
// ----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub order_no: String,
    pub client_id: Uuid,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub gst_rate: Decimal,
    pub lines: Vec<OrderLine>,
}

impl From<CreateOrderRequest> for OrderCommand {
    fn from(request: CreateOrderRequest) -> Self {
        OrderCommand::PlaceOrder {
            order_no: request.order_no,
            client_id: request.client_id,
            due_date: request.due_date,
            gst_rate: request.gst_rate,
            lines: request.lines,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineView {
    pub product_id: Uuid,
    pub unit_type: UnitType,
    pub rate: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cash_rate: Option<Decimal>,
    pub ordered_quantity: Decimal,
    pub dispatched_quantity: Decimal,
    pub remaining_quantity: Decimal,
    pub amount: Decimal,
}

impl From<&LedgerLine> for OrderLineView {
    fn from(entry: &LedgerLine) -> Self {
        Self {
            product_id: entry.product_id(),
            unit_type: entry.line.unit_type,
            rate: entry.line.rate,
            discount: entry.line.discount,
            cash_rate: entry.line.cash_rate,
            ordered_quantity: entry.ordered_quantity(),
            dispatched_quantity: entry.dispatched_quantity,
            remaining_quantity: entry.remaining_quantity(),
            amount: entry.line.amount(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    pub id: Uuid,
    pub order_no: String,
    pub client_id: Uuid,
    pub due_date: Option<NaiveDate>,
    pub gst_rate: Decimal,
    pub status: OrderStatus,
    pub total_amount: Decimal,
    pub dispatch_count: usize,
    pub lines: Vec<OrderLineView>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&OrderAggregate> for OrderView {
    fn from(order: &OrderAggregate) -> Self {
        Self {
            id: order.id,
            order_no: order.order_no.clone(),
            client_id: order.client_id,
            due_date: order.due_date,
            gst_rate: order.gst_rate,
            status: order.status(),
            total_amount: order.total_amount(),
            dispatch_count: order.active_dispatches().count(),
            lines: order.ledger.lines().iter().map(OrderLineView::from).collect(),
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

impl PageQuery {
    /// 1-based page and a limit clamped to `1..=MAX_PAGE_LIMIT`
    pub fn resolve(&self) -> (usize, usize) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self.limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT);
        (page, limit)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPage {
    pub orders: Vec<OrderView>,
    pub page: usize,
    pub limit: usize,
    pub total: usize,
}

// ----------------------------------------------------------------------------
// Sub-orders
// ----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubOrderLine {
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub unit_type: UnitType,
    /// What the client believes is left; never trusted
    #[serde(default)]
    pub remaining_quantity: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtomicSubOrderRequest {
    pub order_no: String,
    pub order_id: Uuid,
    pub client_id: Uuid,
    pub sub_orders: Vec<SubOrderLine>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

impl AtomicSubOrderRequest {
    pub fn dispatch_lines(&self) -> Vec<DispatchLine> {
        self.sub_orders
            .iter()
            .map(|line| DispatchLine::new(line.product_id, line.quantity).with_unit(line.unit_type))
            .collect()
    }

    pub fn product_ids(&self) -> Vec<Uuid> {
        self.sub_orders.iter().map(|line| line.product_id).collect()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AtomicSubOrderResponse {
    pub outcome: DispatchOutcome,
    pub results: Vec<LineResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchRequest {
    pub order_id: Uuid,
    pub lines: Vec<DispatchLine>,
    #[serde(default)]
    pub consignee: Option<Party>,
    #[serde(default)]
    pub buyer: Option<Party>,
    #[serde(default)]
    pub logistics: LogisticsDetails,
    #[serde(default)]
    pub apply_gst: bool,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

impl DispatchRequest {
    pub fn metadata(&self) -> DispatchMetadata {
        DispatchMetadata {
            consignee: self.consignee.clone(),
            buyer: self.buyer.clone(),
            logistics: self.logistics.clone(),
            apply_gst: self.apply_gst,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchHistory {
    pub order_id: Uuid,
    pub dispatches: Vec<DispatchBatch>,
}

// ----------------------------------------------------------------------------
// Health
// ----------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub components: Vec<ComponentHealthView>,
    pub check_time: DateTime<Utc>,
}

impl From<&SystemHealth> for HealthResponse {
    fn from(health: &SystemHealth) -> Self {
        let mut components: Vec<ComponentHealthView> =
            health.components.values().map(ComponentHealthView::from).collect();
        components.sort_by(|a, b| a.name.cmp(&b.name));

        Self {
            status: health.overall_status.label(),
            reason: health.overall_status.reason().map(str::to_string),
            components,
            check_time: health.check_time,
        }
    }
}
