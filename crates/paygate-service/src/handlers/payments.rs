//! Payment handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use paygate_core::{NewPayment, Payment};

use crate::error::ApiError;
use crate::state::AppState;

/// Create payment request.
#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    /// Amount to charge. Must be strictly positive.
    pub amount: Decimal,
    /// Currency code; one of the supported set.
    pub currency: String,
    /// Caller idempotency key; must be unique across payments.
    pub reference: String,
}

/// Payment response.
#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    /// Payment identifier.
    pub id: String,
    /// Amount, decimal string to preserve precision.
    pub amount: Decimal,
    /// Currency code.
    pub currency: String,
    /// Caller idempotency key.
    pub reference: String,
    /// Current processing state.
    pub status: String,
    /// Creation timestamp.
    pub created_at: String,
    /// Last transition timestamp.
    pub updated_at: String,
}

impl From<&Payment> for PaymentResponse {
    fn from(payment: &Payment) -> Self {
        Self {
            id: payment.id.to_string(),
            amount: payment.amount,
            currency: payment.currency.as_str().to_owned(),
            reference: payment.reference.clone(),
            status: payment.status.as_str().to_owned(),
            created_at: payment.created_at.to_rfc3339(),
            updated_at: payment.updated_at.to_rfc3339(),
        }
    }
}

/// Create a payment. 201 with the created record; 400 on validation
/// failure; 409 on a duplicate reference.
pub async fn create_payment(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<PaymentResponse>), ApiError> {
    let request = NewPayment::new(body.amount, &body.currency, &body.reference)?;
    let payment = state.service.create(request).await?;
    Ok((StatusCode::CREATED, Json(PaymentResponse::from(&payment))))
}

/// Fetch a payment by id. 400 on a malformed id; 404 when absent.
pub async fn get_payment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<PaymentResponse>, ApiError> {
    let payment = state
        .service
        .get(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("payment not found: {id}")))?;
    Ok(Json(PaymentResponse::from(&payment)))
}
