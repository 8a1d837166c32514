//! Payment orchestration: creation, lookup, and the idempotent transition.

use std::sync::Arc;
use std::time::Duration;

use paygate_core::{NewPayment, Payment, PaymentError, PaymentId, PaymentStatus};
use paygate_store::{MessageChannel, PaymentStore};

use crate::processor::{PaymentProcessor, ProcessOutcome};

/// Orchestrates the payment lifecycle over a store, a channel, and a
/// processor.
pub struct PaymentService {
    store: Arc<dyn PaymentStore>,
    channel: Arc<dyn MessageChannel>,
    processor: Arc<dyn PaymentProcessor>,
    processing_timeout: Duration,
}

impl PaymentService {
    /// Wire up a service.
    #[must_use]
    pub fn new(
        store: Arc<dyn PaymentStore>,
        channel: Arc<dyn MessageChannel>,
        processor: Arc<dyn PaymentProcessor>,
        processing_timeout: Duration,
    ) -> Self {
        Self {
            store,
            channel,
            processor,
            processing_timeout,
        }
    }

    /// Create a payment: dedup check, persist as `PENDING`, publish its id
    /// for asynchronous processing.
    ///
    /// Publish failure does not fail the call: the payment is already
    /// durable at that point, so the error is logged and swallowed. The
    /// payment stays `PENDING` until its id is republished.
    ///
    /// # Errors
    ///
    /// [`PaymentError::Conflict`] for a duplicate reference,
    /// [`PaymentError::Internal`] when the store is unavailable.
    pub async fn create(&self, request: NewPayment) -> Result<Payment, PaymentError> {
        if self
            .store
            .get_by_reference(&request.reference)
            .await
            .map_err(PaymentError::from)?
            .is_some()
        {
            return Err(PaymentError::Conflict {
                reference: request.reference,
            });
        }

        let payment = Payment::create(request);
        self.store.insert(&payment).await?;

        if let Err(err) = self.channel.publish(&payment.id.to_string()).await {
            tracing::error!(
                payment_id = %payment.id,
                error = %err,
                "failed to publish payment for processing"
            );
        }

        tracing::info!(
            payment_id = %payment.id,
            reference = %payment.reference,
            amount = %payment.amount,
            currency = %payment.currency,
            "payment created"
        );
        Ok(payment)
    }

    /// Look up a payment by its raw id string.
    ///
    /// # Errors
    ///
    /// [`PaymentError::Validation`] when the id is malformed,
    /// [`PaymentError::Internal`] when the store is unavailable. Absence is
    /// `Ok(None)`; callers decide how to surface it.
    pub async fn get(&self, raw_id: &str) -> Result<Option<Payment>, PaymentError> {
        let id = parse_id(raw_id)?;
        Ok(self.store.get(id).await?)
    }

    /// Drive a payment through its single terminal transition.
    ///
    /// The payment row is fetched under an exclusive lock held for the whole
    /// step, so concurrent attempts on the same id serialize; the loser of
    /// that race observes a finalized payment and gets
    /// [`PaymentError::AlreadyProcessed`] without any mutation. The external
    /// effect runs under the configured deadline; exceeding it releases the
    /// lock untouched and reports a retryable [`PaymentError::Timeout`].
    ///
    /// # Errors
    ///
    /// [`PaymentError::Validation`] for a malformed id,
    /// [`PaymentError::NotFound`] for an unknown one,
    /// [`PaymentError::AlreadyProcessed`] for the idempotent no-op,
    /// [`PaymentError::Timeout`] and [`PaymentError::Internal`] for
    /// retryable failures.
    pub async fn process(&self, raw_id: &str) -> Result<Payment, PaymentError> {
        let id = parse_id(raw_id)?;

        let Some(locked) = self.store.lock(id).await.map_err(PaymentError::from)? else {
            return Err(PaymentError::NotFound {
                id: raw_id.to_owned(),
            });
        };

        let current = locked.payment().clone();
        if current.status != PaymentStatus::Pending {
            tracing::info!(
                payment_id = %id,
                status = %current.status,
                "payment already processed"
            );
            locked.release().await?;
            return Err(PaymentError::AlreadyProcessed {
                id,
                status: current.status,
            });
        }

        let outcome =
            tokio::time::timeout(self.processing_timeout, self.processor.execute(&current)).await;

        let status = match outcome {
            Err(_elapsed) => {
                locked.release().await?;
                return Err(PaymentError::Timeout {
                    seconds: self.processing_timeout.as_secs(),
                });
            }
            Ok(Err(err)) => {
                locked.release().await?;
                return Err(PaymentError::Internal(err.to_string()));
            }
            Ok(Ok(ProcessOutcome::Captured)) => PaymentStatus::Success,
            Ok(Ok(ProcessOutcome::Declined { reason })) => {
                tracing::warn!(payment_id = %id, reason = %reason, "payment declined");
                PaymentStatus::Failed
            }
        };

        let updated = locked.finalize(status).await?;
        tracing::info!(payment_id = %id, status = %updated.status, "payment processed");
        Ok(updated)
    }
}

fn parse_id(raw: &str) -> Result<PaymentId, PaymentError> {
    raw.parse()
        .map_err(|_| PaymentError::Validation(format!("invalid payment id {raw:?}")))
}
