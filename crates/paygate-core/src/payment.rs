//! Payment entity and its value types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PaymentError;
use crate::ids::PaymentId;

/// Supported settlement currencies (closed set).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// United States dollar.
    Usd,
    /// Ethiopian birr.
    Etb,
}

impl Currency {
    /// All currencies accepted at creation time.
    pub const ALLOWED: [Self; 2] = [Self::Usd, Self::Etb];

    /// The currency code as stored and serialized.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Usd => "USD",
            Self::Etb => "ETB",
        }
    }
}

impl FromStr for Currency {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USD" => Ok(Self::Usd),
            "ETB" => Ok(Self::Etb),
            other => Err(PaymentError::Validation(format!(
                "unsupported currency {other:?}, expected one of USD, ETB"
            ))),
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Processing state of a payment.
///
/// The only legal transitions are `PENDING -> SUCCESS` and
/// `PENDING -> FAILED`; both targets are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    /// Created and queued, not yet processed.
    Pending,
    /// Processing completed successfully.
    Success,
    /// Processing completed with a failure.
    Failed,
}

impl PaymentStatus {
    /// The status as stored and serialized.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
        }
    }

    /// Whether this status admits no further transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

impl FromStr for PaymentStatus {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "SUCCESS" => Ok(Self::Success),
            "FAILED" => Ok(Self::Failed),
            other => Err(PaymentError::Internal(format!(
                "unknown payment status {other:?}"
            ))),
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated payment-creation request.
///
/// Construction via [`NewPayment::new`] is the validation boundary: an
/// instance of this type is guaranteed to have a strictly positive amount,
/// a supported currency, and a non-empty reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPayment {
    /// Amount to charge. Strictly positive.
    pub amount: Decimal,
    /// Settlement currency.
    pub currency: Currency,
    /// Caller-supplied idempotency key, unique across all payments.
    pub reference: String,
}

impl NewPayment {
    /// Validate raw request fields into a `NewPayment`.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Validation`] when the amount is not strictly
    /// positive, the currency is outside the allowed set, or the reference
    /// is empty.
    pub fn new(amount: Decimal, currency: &str, reference: &str) -> Result<Self, PaymentError> {
        if amount <= Decimal::ZERO {
            return Err(PaymentError::Validation(format!(
                "amount must be greater than zero, got {amount}"
            )));
        }
        let currency = currency.parse::<Currency>()?;
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(PaymentError::Validation(
                "reference must not be empty".into(),
            ));
        }
        Ok(Self {
            amount,
            currency,
            reference: reference.to_owned(),
        })
    }
}

/// The payment entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    /// Unique identifier, generated at creation.
    pub id: PaymentId,
    /// Amount to charge.
    pub amount: Decimal,
    /// Settlement currency.
    pub currency: Currency,
    /// Caller-supplied idempotency key.
    pub reference: String,
    /// Current processing state.
    pub status: PaymentStatus,
    /// When the payment was created.
    pub created_at: DateTime<Utc>,
    /// Refreshed on every status transition.
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// Materialize a freshly validated request as a `PENDING` payment with
    /// a generated id and current timestamps.
    #[must_use]
    pub fn create(request: NewPayment) -> Self {
        let now = Utc::now();
        Self {
            id: PaymentId::generate(),
            amount: request.amount,
            currency: request.currency,
            reference: request.reference,
            status: PaymentStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn new_payment_accepts_valid_input() {
        let p = NewPayment::new(dec!(100.50), "USD", "order-1").unwrap();
        assert_eq!(p.amount, dec!(100.50));
        assert_eq!(p.currency, Currency::Usd);
        assert_eq!(p.reference, "order-1");
    }

    #[test]
    fn new_payment_rejects_zero_amount() {
        let err = NewPayment::new(dec!(0), "USD", "order-1").unwrap_err();
        assert!(matches!(err, PaymentError::Validation(_)));
    }

    #[test]
    fn new_payment_rejects_negative_amount() {
        let err = NewPayment::new(dec!(-5.00), "ETB", "order-1").unwrap_err();
        assert!(matches!(err, PaymentError::Validation(_)));
    }

    #[test]
    fn new_payment_rejects_unknown_currency() {
        let err = NewPayment::new(dec!(10), "EUR", "order-1").unwrap_err();
        assert!(matches!(err, PaymentError::Validation(_)));
    }

    #[test]
    fn new_payment_rejects_blank_reference() {
        let err = NewPayment::new(dec!(10), "USD", "   ").unwrap_err();
        assert!(matches!(err, PaymentError::Validation(_)));
    }

    #[test]
    fn create_starts_pending_with_matching_timestamps() {
        let p = Payment::create(NewPayment::new(dec!(10), "USD", "order-1").unwrap());
        assert_eq!(p.status, PaymentStatus::Pending);
        assert_eq!(p.created_at, p.updated_at);
    }

    #[test]
    fn status_terminality() {
        assert!(!PaymentStatus::Pending.is_terminal());
        assert!(PaymentStatus::Success.is_terminal());
        assert!(PaymentStatus::Failed.is_terminal());
    }

    #[test]
    fn status_roundtrip() {
        for s in [
            PaymentStatus::Pending,
            PaymentStatus::Success,
            PaymentStatus::Failed,
        ] {
            assert_eq!(s.as_str().parse::<PaymentStatus>().unwrap(), s);
        }
    }

    #[test]
    fn payment_serializes_uppercase_enums() {
        let p = Payment::create(NewPayment::new(dec!(42.42), "ETB", "ref-9").unwrap());
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["status"], "PENDING");
        assert_eq!(json["currency"], "ETB");
    }
}
