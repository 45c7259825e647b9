use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::value_objects::{DispatchLine, DispatchMetadata, OrderLine};

// ============================================================================
// Order Commands - Represent user intent
// ============================================================================

#[derive(Debug, Clone)]
pub enum OrderCommand {
    PlaceOrder {
        order_no: String,
        client_id: Uuid,
        due_date: Option<NaiveDate>,
        gst_rate: Decimal,
        lines: Vec<OrderLine>,
    },
    DispatchLines {
        dispatch_id: Uuid,
        lines: Vec<DispatchLine>,
        metadata: DispatchMetadata,
        idempotency_key: Option<String>,
    },
    RollBackDispatch {
        dispatch_id: Uuid,
        reason: String,
    },
}
