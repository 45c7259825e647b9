use crate::domain::dispatch::RecordStoreError;
use crate::domain::order::{LineRejection, OrderError};
use crate::event_sourcing::EventStoreError;

// ============================================================================
// Fulfillment Error Taxonomy
// ============================================================================
//
// Every failure the engine reports is one of four recoverable kinds.
// Validation failures carry per-line attribution so a caller can correct
// only the offending quantities.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum FulfillmentError {
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        rejections: Vec<LineRejection>,
    },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Storage failure: {0}")]
    Storage(String),
}

impl FulfillmentError {
    pub fn validation(message: impl Into<String>) -> Self {
        FulfillmentError::Validation {
            message: message.into(),
            rejections: Vec::new(),
        }
    }

    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        FulfillmentError::NotFound { kind, id: id.to_string() }
    }

    /// Per-line reasons, empty for request-level failures
    pub fn rejections(&self) -> &[LineRejection] {
        match self {
            FulfillmentError::Validation { rejections, .. } => rejections,
            _ => &[],
        }
    }

    /// Label used for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            FulfillmentError::Validation { .. } => "validation",
            FulfillmentError::Conflict(_) => "conflict",
            FulfillmentError::NotFound { .. } => "not_found",
            FulfillmentError::Storage(_) => "storage",
        }
    }
}

impl From<OrderError> for FulfillmentError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::LinesRejected(rejections) => FulfillmentError::Validation {
                message: format!("{} line(s) rejected", rejections.len()),
                rejections,
            },
            OrderError::UnknownDispatch(id) => FulfillmentError::not_found("Dispatch", id),
            OrderError::AlreadyPlaced
            | OrderError::AlreadyCommitted { .. }
            | OrderError::IdempotencyKeyReused(_) => FulfillmentError::Conflict(err.to_string()),
            OrderError::NotInitialized => FulfillmentError::Storage(err.to_string()),
            OrderError::EmptyLines
            | OrderError::EmptyOrderNumber
            | OrderError::DuplicateProduct(_)
            | OrderError::InvalidQuantity { .. }
            | OrderError::InvalidRate { .. }
            | OrderError::InvalidDiscount { .. }
            | OrderError::InvalidGstRate(_)
            | OrderError::EmptyDispatch => FulfillmentError::validation(err.to_string()),
        }
    }
}

impl From<EventStoreError> for FulfillmentError {
    fn from(err: EventStoreError) -> Self {
        match err {
            EventStoreError::ConcurrencyConflict { .. } => FulfillmentError::Conflict(err.to_string()),
            EventStoreError::AggregateNotFound(id) => FulfillmentError::not_found("Order", id),
            EventStoreError::EmptyAppend
            | EventStoreError::Serialization(_)
            | EventStoreError::Replay { .. } => FulfillmentError::Storage(err.to_string()),
        }
    }
}

impl From<RecordStoreError> for FulfillmentError {
    fn from(err: RecordStoreError) -> Self {
        match err {
            RecordStoreError::NotFound(id) => FulfillmentError::not_found("Dispatch", id),
            RecordStoreError::Duplicate(_)
            | RecordStoreError::OrderMismatch { .. }
            | RecordStoreError::Unavailable(_) => FulfillmentError::Storage(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::RejectionReason;
    use uuid::Uuid;

    #[test]
    fn test_line_rejections_become_validation_errors() {
        let product_id = Uuid::new_v4();
        let err: FulfillmentError =
            OrderError::LinesRejected(vec![LineRejection::new(product_id, RejectionReason::UnknownLine)]).into();

        assert_eq!(err.kind(), "validation");
        assert_eq!(err.rejections().len(), 1);
        assert_eq!(err.rejections()[0].product_id, product_id);
    }

    #[test]
    fn test_store_conflicts_map_to_conflict() {
        let err: FulfillmentError = EventStoreError::ConcurrencyConflict {
            aggregate_id: Uuid::new_v4(),
            expected: 1,
            current: 2,
        }
        .into();
        assert!(matches!(err, FulfillmentError::Conflict(_)));

        let err: FulfillmentError = EventStoreError::AggregateNotFound(Uuid::nil()).into();
        assert!(matches!(err, FulfillmentError::NotFound { kind: "Order", .. }));
    }
}
