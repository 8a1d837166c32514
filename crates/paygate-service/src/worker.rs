//! The consumer loop.
//!
//! Pulls deliveries off the message channel, invokes payment processing
//! under the retry policy, and settles every message exactly one way:
//! acknowledged on success (including the idempotent already-processed
//! outcome) or dead-lettered once the retry budget is spent or the failure
//! is not retryable. Messages are never requeued, so a poison message can
//! never livelock the queue.

use std::sync::Arc;

use tokio::sync::watch;

use paygate_core::{PaymentError, RetryPolicy};
use paygate_store::{ChannelError, Delivery, MessageChannel};

use crate::service::PaymentService;

/// Consumes payment-processing messages until shutdown.
pub struct Consumer {
    service: Arc<PaymentService>,
    channel: Arc<dyn MessageChannel>,
    retry: RetryPolicy,
}

impl Consumer {
    /// Wire up a consumer.
    #[must_use]
    pub fn new(
        service: Arc<PaymentService>,
        channel: Arc<dyn MessageChannel>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            service,
            channel,
            retry,
        }
    }

    /// Run until `shutdown` flips to `true` or the channel closes.
    ///
    /// Shutdown is graceful: a delivery being handled when the signal
    /// arrives is carried through to its ack or reject; only the next
    /// receive is abandoned.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError`] when receiving from the channel fails.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<(), ChannelError> {
        tracing::info!("waiting for messages");
        loop {
            let delivery = tokio::select! {
                _ = shutdown.wait_for(|stop| *stop) => {
                    tracing::info!("shutdown signal received, stopping consumer");
                    return Ok(());
                }
                delivery = self.channel.receive() => match delivery? {
                    Some(delivery) => delivery,
                    None => {
                        tracing::info!("channel closed, stopping consumer");
                        return Ok(());
                    }
                },
            };
            self.handle(delivery).await;
        }
    }

    async fn handle(&self, delivery: Delivery) {
        match self.process_with_retry(&delivery.body).await {
            Ok(()) => {
                if let Err(err) = self.channel.ack(&delivery).await {
                    tracing::error!(
                        payment_id = %delivery.body,
                        error = %err,
                        "failed to ack delivery"
                    );
                }
            }
            Err(err) => {
                tracing::error!(
                    payment_id = %delivery.body,
                    error = %err,
                    "payment failed permanently, dead-lettering"
                );
                if let Err(reject_err) = self.channel.reject(&delivery, &err.to_string()).await {
                    tracing::error!(
                        payment_id = %delivery.body,
                        error = %reject_err,
                        "failed to dead-letter delivery"
                    );
                }
            }
        }
    }

    /// Process one payment id under the retry policy.
    ///
    /// Only retryable failures burn the budget; validation failures,
    /// unknown payments, and the like short-circuit immediately. The
    /// already-processed outcome of a duplicate delivery counts as success.
    async fn process_with_retry(&self, raw_id: &str) -> Result<(), PaymentError> {
        let mut attempt = 1u32;
        loop {
            match self.service.process(raw_id).await {
                Ok(_) => return Ok(()),
                Err(PaymentError::AlreadyProcessed { id, status }) => {
                    tracing::info!(
                        payment_id = %id,
                        status = %status,
                        "duplicate delivery for finalized payment"
                    );
                    return Ok(());
                }
                Err(err) if err.is_retryable() && attempt < self.retry.attempts => {
                    let delay = self.retry.delay_after(attempt);
                    tracing::warn!(
                        payment_id = %raw_id,
                        attempt,
                        max_attempts = self.retry.attempts,
                        delay = ?delay,
                        error = %err,
                        "processing attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
