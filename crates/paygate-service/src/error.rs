//! API error types and responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use paygate_core::PaymentError;

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Bad request - invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Conflict - duplicate reference or invalid state transition.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Upstream processing exceeded its deadline.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            Self::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.clone()),
            Self::Timeout(msg) => (StatusCode::GATEWAY_TIMEOUT, "timeout", msg.clone()),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::Validation(msg) => Self::BadRequest(msg),
            PaymentError::Conflict { reference } => Self::Conflict(format!(
                "payment with reference {reference:?} already exists"
            )),
            PaymentError::NotFound { id } => Self::NotFound(format!("payment not found: {id}")),
            PaymentError::AlreadyProcessed { id, status } => Self::Conflict(format!(
                "payment {id} already processed with status {status}"
            )),
            PaymentError::Timeout { seconds } => {
                Self::Timeout(format!("processing timed out after {seconds}s"))
            }
            PaymentError::Internal(msg) => Self::Internal(msg),
        }
    }
}
