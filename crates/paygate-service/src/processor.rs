//! The external processing seam.
//!
//! Processing a payment means performing some effect against a downstream
//! system (a card network, a bank rail). That effect is behind the
//! [`PaymentProcessor`] trait so the terminal status always derives from a
//! real outcome signal; nothing in the pipeline flips coins.

use std::time::Duration;

use async_trait::async_trait;

use paygate_core::Payment;

/// Outcome of the external processing effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The downstream accepted the payment.
    Captured,
    /// The downstream definitively refused the payment.
    Declined {
        /// Downstream-supplied reason.
        reason: String,
    },
}

/// A transient processor failure (downstream unreachable, throttled).
///
/// Distinct from [`ProcessOutcome::Declined`]: a decline is a terminal
/// answer, this is worth retrying.
#[derive(Debug, thiserror::Error)]
#[error("processor unavailable: {0}")]
pub struct ProcessorError(pub String);

/// The external effect a payment is processed against.
///
/// The caller bounds every invocation with a deadline; implementations do
/// not need their own timeout handling.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Execute the effect for one payment.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessorError`] for transient failures; definitive
    /// refusals are `Ok(Declined { .. })`.
    async fn execute(&self, payment: &Payment) -> Result<ProcessOutcome, ProcessorError>;
}

/// Stand-in for a downstream capture call: waits out a configured latency
/// and approves. Deployments integrate a real processor behind the trait.
#[derive(Debug, Clone)]
pub struct CaptureSimulator {
    latency: Duration,
}

impl CaptureSimulator {
    /// Create a simulator with the given per-call latency.
    #[must_use]
    pub const fn new(latency: Duration) -> Self {
        Self { latency }
    }
}

impl Default for CaptureSimulator {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

#[async_trait]
impl PaymentProcessor for CaptureSimulator {
    async fn execute(&self, payment: &Payment) -> Result<ProcessOutcome, ProcessorError> {
        tracing::debug!(
            payment_id = %payment.id,
            amount = %payment.amount,
            currency = %payment.currency,
            "simulating downstream capture"
        );
        tokio::time::sleep(self.latency).await;
        Ok(ProcessOutcome::Captured)
    }
}
