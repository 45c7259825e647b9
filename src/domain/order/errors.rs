use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::value_objects::UnitType;

// ============================================================================
// Order Business Rule Errors
// ============================================================================

/// Why a single requested line could not be deducted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionReason {
    NonPositiveQuantity { requested: Decimal },
    #[serde(rename_all = "camelCase")]
    ExceedsRemaining { requested: Decimal, remaining: Decimal },
    UnknownLine,
    DuplicateLine,
    #[serde(rename_all = "camelCase")]
    UnitMismatch { expected: UnitType, requested: UnitType },
}

impl RejectionReason {
    /// Stable machine-readable code, same as the serialized tag
    pub fn code(&self) -> &'static str {
        match self {
            RejectionReason::NonPositiveQuantity { .. } => "NON_POSITIVE_QUANTITY",
            RejectionReason::ExceedsRemaining { .. } => "EXCEEDS_REMAINING",
            RejectionReason::UnknownLine => "UNKNOWN_LINE",
            RejectionReason::DuplicateLine => "DUPLICATE_LINE",
            RejectionReason::UnitMismatch { .. } => "UNIT_MISMATCH",
        }
    }
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectionReason::NonPositiveQuantity { requested } => {
                write!(f, "quantity must be positive, got {}", requested)
            }
            RejectionReason::ExceedsRemaining { requested, remaining } => {
                write!(f, "requested {} exceeds remaining quantity {}", requested, remaining)
            }
            RejectionReason::UnknownLine => f.write_str("product is not part of this order"),
            RejectionReason::DuplicateLine => f.write_str("product appears more than once in the dispatch"),
            RejectionReason::UnitMismatch { expected, requested } => {
                write!(f, "unit type {} does not match ordered unit {}", requested, expected)
            }
        }
    }
}

/// A failing line and its reason
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineRejection {
    pub product_id: Uuid,
    pub reason: RejectionReason,
}

impl LineRejection {
    pub fn new(product_id: Uuid, reason: RejectionReason) -> Self {
        Self { product_id, reason }
    }
}

fn describe(rejections: &[LineRejection]) -> String {
    rejections
        .iter()
        .map(|r| format!("{}: {}", r.product_id, r.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Order lines cannot be empty")]
    EmptyLines,

    #[error("Order number cannot be empty")]
    EmptyOrderNumber,

    #[error("Product {0} appears more than once in the order")]
    DuplicateProduct(Uuid),

    #[error("Invalid ordered quantity for product {product_id}: {quantity}")]
    InvalidQuantity { product_id: Uuid, quantity: Decimal },

    #[error("Invalid rate for product {product_id}: {rate}")]
    InvalidRate { product_id: Uuid, rate: Decimal },

    #[error("Invalid discount for product {product_id}: {discount}")]
    InvalidDiscount { product_id: Uuid, discount: Decimal },

    #[error("Invalid GST rate: {0}")]
    InvalidGstRate(Decimal),

    #[error("Dispatch must contain at least one line")]
    EmptyDispatch,

    #[error("Dispatch rejected: {}", describe(.0))]
    LinesRejected(Vec<LineRejection>),

    #[error("Dispatch {0} is not part of this order")]
    UnknownDispatch(Uuid),

    #[error("Idempotency key {key} already committed as dispatch {dispatch_id}")]
    AlreadyCommitted { key: String, dispatch_id: Uuid },

    #[error("Idempotency key {0} was used for a different dispatch")]
    IdempotencyKeyReused(String),

    #[error("Order has already been placed")]
    AlreadyPlaced,

    #[error("Aggregate not initialized")]
    NotInitialized,
}
