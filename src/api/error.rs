use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;

use crate::domain::order::LineRejection;
use crate::error::FulfillmentError;

// ============================================================================
// HTTP Error Mapping
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Fulfillment(#[from] FulfillmentError),

    /// Body, path or query could not be parsed
    #[error("Malformed request: {0}")]
    BadRequest(String),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rejections: Vec<LineRejection>,
}

impl ApiError {
    fn code(&self) -> &'static str {
        match self {
            ApiError::Fulfillment(FulfillmentError::Validation { .. }) => "VALIDATION_ERROR",
            ApiError::Fulfillment(FulfillmentError::Conflict(_)) => "CONFLICT",
            ApiError::Fulfillment(FulfillmentError::NotFound { .. }) => "NOT_FOUND",
            ApiError::Fulfillment(FulfillmentError::Storage(_)) => "STORAGE_ERROR",
            ApiError::BadRequest(_) => "BAD_REQUEST",
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Fulfillment(FulfillmentError::Validation { .. }) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Fulfillment(FulfillmentError::Conflict(_)) => StatusCode::CONFLICT,
            ApiError::Fulfillment(FulfillmentError::NotFound { .. }) => StatusCode::NOT_FOUND,
            ApiError::Fulfillment(FulfillmentError::Storage(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let rejections = match self {
            ApiError::Fulfillment(err) => err.rejections().to_vec(),
            _ => Vec::new(),
        };

        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: self.code(),
            message: self.to_string(),
            rejections,
        })
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
