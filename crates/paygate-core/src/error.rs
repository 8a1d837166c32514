//! Error taxonomy for paygate.

use crate::ids::PaymentId;
use crate::payment::PaymentStatus;

/// Result type for paygate operations.
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Errors produced by the payment service layer.
///
/// Every variant carries a machine-readable kind (see [`PaymentError::code`])
/// so that callers dispatch on structure, never on message text. The consumer
/// loop uses [`PaymentError::is_retryable`] to decide between retrying,
/// acknowledging, and dead-lettering; the HTTP layer maps variants to status
/// codes.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PaymentError {
    /// Invalid input. Rejected before any I/O, never retried.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A payment with the same reference already exists. Never retried.
    #[error("payment with reference {reference:?} already exists")]
    Conflict {
        /// The duplicated idempotency key.
        reference: String,
    },

    /// No payment with the given id. Never retried.
    #[error("payment not found: {id}")]
    NotFound {
        /// The id that was looked up, as received.
        id: String,
    },

    /// The payment was already finalized by an earlier attempt.
    ///
    /// This is the idempotent no-op outcome of duplicate delivery; consumers
    /// treat it as success.
    #[error("payment {id} already processed with status {status}")]
    AlreadyProcessed {
        /// The payment in question.
        id: PaymentId,
        /// Its terminal status.
        status: PaymentStatus,
    },

    /// The external processing step exceeded its deadline. Retried.
    #[error("processing timed out after {seconds}s")]
    Timeout {
        /// The deadline that was exceeded.
        seconds: u64,
    },

    /// Store or channel unavailable. Retried with backoff up to a bound.
    #[error("internal error: {0}")]
    Internal(String),
}

impl PaymentError {
    /// Machine-readable error kind for wire formats and logs.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Conflict { .. } => "conflict",
            Self::NotFound { .. } => "not_found",
            Self::AlreadyProcessed { .. } => "already_processed",
            Self::Timeout { .. } => "timeout",
            Self::Internal(_) => "internal",
        }
    }

    /// Whether a retry of the failed operation could ever succeed.
    ///
    /// Only transient failures qualify. Validation failures, duplicate
    /// references, missing payments, and the idempotent
    /// [`AlreadyProcessed`](Self::AlreadyProcessed) outcome are final on the
    /// first attempt.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Internal(_) | Self::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryability_per_kind() {
        assert!(!PaymentError::Validation("bad".into()).is_retryable());
        assert!(!PaymentError::Conflict {
            reference: "order-1".into()
        }
        .is_retryable());
        assert!(!PaymentError::NotFound { id: "x".into() }.is_retryable());
        assert!(!PaymentError::AlreadyProcessed {
            id: PaymentId::generate(),
            status: PaymentStatus::Success,
        }
        .is_retryable());
        assert!(PaymentError::Timeout { seconds: 5 }.is_retryable());
        assert!(PaymentError::Internal("db down".into()).is_retryable());
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(PaymentError::Validation(String::new()).code(), "validation");
        assert_eq!(
            PaymentError::Conflict {
                reference: String::new()
            }
            .code(),
            "conflict"
        );
        assert_eq!(
            PaymentError::NotFound { id: String::new() }.code(),
            "not_found"
        );
    }
}
