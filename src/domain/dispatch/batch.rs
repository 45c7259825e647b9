use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::order::{DispatchMetadata, LineRejection, OrderAggregate, OrderDispatched, UnitType};
use crate::error::FulfillmentError;

// ============================================================================
// Dispatch Batch (Sub-Order)
// ============================================================================

/// One committed line of a dispatch, priced at commit time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchedLine {
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub unit_type: UnitType,
    pub rate: Decimal,
    pub amount: Decimal,
    /// Line balance right after this dispatch committed
    pub remaining_after: Decimal,
}

/// An immutable, committed sub-order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchBatch {
    pub id: Uuid,
    pub order_id: Uuid,
    pub order_no: String,
    pub client_id: Uuid,
    pub sequence: u32,
    pub invoice_number: String,
    pub lines: Vec<DispatchedLine>,
    pub metadata: DispatchMetadata,
    /// GST percentage, present only when the dispatch is taxed
    pub gst_rate: Option<Decimal>,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl DispatchBatch {
    /// Build the record of a dispatch from the order state it produced
    pub fn from_commit(order: &OrderAggregate, event: &OrderDispatched) -> Self {
        let lines = event
            .lines
            .iter()
            .filter_map(|requested| {
                let entry = order.ledger.line(requested.product_id)?;
                Some(DispatchedLine {
                    product_id: requested.product_id,
                    quantity: requested.quantity,
                    unit_type: entry.line.unit_type,
                    rate: entry.line.effective_rate(),
                    amount: entry.line.amount_for(requested.quantity),
                    remaining_after: entry.remaining_quantity(),
                })
            })
            .collect();

        Self {
            id: event.dispatch_id,
            order_id: order.id,
            order_no: order.order_no.clone(),
            client_id: order.client_id,
            sequence: event.sequence,
            invoice_number: format!("{}/{}", order.order_no, event.sequence),
            lines,
            metadata: event.metadata.clone(),
            gst_rate: event.metadata.apply_gst.then_some(order.gst_rate),
            idempotency_key: event.idempotency_key.clone(),
            created_at: event.dispatched_at,
        }
    }

    /// Quantity this batch took from a line; zero when the line is not part of it
    pub fn quantity_for(&self, product_id: Uuid) -> Decimal {
        self.lines
            .iter()
            .filter(|l| l.product_id == product_id)
            .map(|l| l.quantity)
            .sum()
    }

    pub fn taxable_amount(&self) -> Decimal {
        self.lines.iter().map(|l| l.amount).sum()
    }

    pub fn gst_amount(&self) -> Decimal {
        match self.gst_rate {
            Some(rate) => (self.taxable_amount() * rate / Decimal::ONE_HUNDRED).round_dp(2),
            None => Decimal::ZERO,
        }
    }

    pub fn total_amount(&self) -> Decimal {
        self.taxable_amount() + self.gst_amount()
    }
}

// ============================================================================
// Dispatch Outcome - single tagged result for callers
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DispatchOutcome {
    Committed(DispatchBatch),
    Rejected(Vec<LineRejection>),
}

/// Per-line attribution of an outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineResult {
    pub product_id: Uuid,
    pub success: bool,
    pub message: String,
}

impl DispatchOutcome {
    /// Fold a submission result into an outcome.
    /// Only line-attributed validation failures become `Rejected`; anything else stays an error.
    pub fn from_result(result: Result<DispatchBatch, FulfillmentError>) -> Result<Self, FulfillmentError> {
        match result {
            Ok(batch) => Ok(DispatchOutcome::Committed(batch)),
            Err(FulfillmentError::Validation { rejections, .. }) if !rejections.is_empty() => {
                Ok(DispatchOutcome::Rejected(rejections))
            }
            Err(e) => Err(e),
        }
    }

    pub fn is_committed(&self) -> bool {
        matches!(self, DispatchOutcome::Committed(_))
    }

    /// A line succeeds only when the whole batch committed
    pub fn line_results(&self, requested: &[Uuid]) -> Vec<LineResult> {
        match self {
            DispatchOutcome::Committed(batch) => requested
                .iter()
                .map(|product_id| LineResult {
                    product_id: *product_id,
                    success: true,
                    message: format!("dispatched {} in {}", batch.quantity_for(*product_id), batch.invoice_number),
                })
                .collect(),
            DispatchOutcome::Rejected(rejections) => requested
                .iter()
                .map(|product_id| {
                    let message = rejections
                        .iter()
                        .find(|r| r.product_id == *product_id)
                        .map(|r| r.reason.to_string())
                        .unwrap_or_else(|| "not dispatched: another line in the batch was rejected".to_string());
                    LineResult { product_id: *product_id, success: false, message }
                })
                .collect(),
        }
    }
}
