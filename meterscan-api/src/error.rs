//! Error types for meterscan-api
//!
//! Every failure a client can see carries a fixed error code and HTTP
//! status. Handlers return [`ApiResult`] and the response body is always
//! `{"error_code": ..., "error_description": ...}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::db::measures::StoreError;

/// Message used whenever internal detail must not leak to the client
pub const UNEXPECTED_ERROR: &str = "An unexpected error occurred";

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Request body, path or query failed shape validation (400)
    #[error("{0}")]
    InvalidData(String),

    /// Unsupported meter type filter (400)
    #[error("{0}")]
    InvalidType(String),

    /// Reading already recorded this month (409)
    #[error("{0}")]
    DoubleReport(String),

    /// Reading to confirm does not exist (404)
    #[error("{0}")]
    MeasureNotFound(String),

    /// Reading was already confirmed (409)
    #[error("{0}")]
    ConfirmationDuplicate(String),

    /// Customer has no matching readings (404)
    #[error("{0}")]
    MeasuresNotFound(String),

    /// Request rate limit exceeded (429)
    #[error("{0}")]
    RateLimited(String),

    /// Vision service or unexpected failure (500)
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidData(_) => "INVALID_DATA",
            ApiError::InvalidType(_) => "INVALID_TYPE",
            ApiError::DoubleReport(_) => "DOUBLE_REPORT",
            ApiError::MeasureNotFound(_) => "MEASURE_NOT_FOUND",
            ApiError::ConfirmationDuplicate(_) => "CONFIRMATION_DUPLICATE",
            ApiError::MeasuresNotFound(_) => "MEASURES_NOT_FOUND",
            ApiError::RateLimited(_) => "RATE_LIMITED",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidData(_) | ApiError::InvalidType(_) => StatusCode::BAD_REQUEST,
            ApiError::DoubleReport(_) | ApiError::ConfirmationDuplicate(_) => StatusCode::CONFLICT,
            ApiError::MeasureNotFound(_) | ApiError::MeasuresNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn double_report() -> Self {
        ApiError::DoubleReport("Monthly reading already recorded".to_string())
    }

    pub fn unexpected() -> Self {
        ApiError::Internal(UNEXPECTED_ERROR.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateMonth { .. } => ApiError::double_report(),
            other => {
                error!(error = %other, "Measure store failure");
                ApiError::unexpected()
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "error_code": self.code(),
            "error_description": self.to_string(),
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers and use cases
pub type ApiResult<T> = Result<T, ApiError>;
