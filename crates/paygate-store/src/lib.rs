//! Storage and message-channel contracts for paygate, with PostgreSQL and
//! in-memory implementations.
//!
//! The two seams here carry the pipeline's correctness guarantees:
//!
//! - [`PaymentStore`] persists payments and hands out exclusive per-payment
//!   locks ([`LockedPayment`]) for the single terminal status transition.
//! - [`MessageChannel`] is a durable at-least-once queue with manual
//!   acknowledgment and a dead-letter destination.
//!
//! [`PgPaymentStore`] and [`PgMessageChannel`] are the production backends;
//! [`MemoryStore`] and [`MemoryChannel`] back tests and demos.

#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod memory;
pub mod postgres;

pub use error::{ChannelError, StoreError};
pub use memory::{DeadLetter, MemoryChannel, MemoryStore};
pub use postgres::{PgMessageChannel, PgPaymentStore, MIGRATOR};

use async_trait::async_trait;

use paygate_core::{Payment, PaymentId, PaymentStatus};

/// Durable keyed storage for [`Payment`] entities.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Persist a new payment. Fails with
    /// [`StoreError::DuplicateReference`] when the reference is taken.
    async fn insert(&self, payment: &Payment) -> Result<(), StoreError>;

    /// Fetch a payment by id.
    async fn get(&self, id: PaymentId) -> Result<Option<Payment>, StoreError>;

    /// Fetch a payment by its caller-supplied reference.
    async fn get_by_reference(&self, reference: &str) -> Result<Option<Payment>, StoreError>;

    /// Fetch a payment under an exclusive per-payment lock.
    ///
    /// The lock serializes concurrent processing attempts for the same id
    /// while leaving distinct ids fully parallel. It is held until the
    /// returned guard is finalized, released, or dropped (drop behaves like
    /// release: the row is left untouched).
    ///
    /// Returns `Ok(None)` when no such payment exists; no lock is held in
    /// that case.
    async fn lock(&self, id: PaymentId) -> Result<Option<Box<dyn LockedPayment>>, StoreError>;
}

/// An exclusively locked payment row.
///
/// Exactly one of [`finalize`](Self::finalize) or
/// [`release`](Self::release) ends the lock; dropping the guard is
/// equivalent to releasing it.
#[async_trait]
pub trait LockedPayment: Send {
    /// The payment as read under the lock.
    fn payment(&self) -> &Payment;

    /// Write the terminal status and a fresh `updated_at` within the locked
    /// transaction, then release the lock. Returns the updated payment.
    async fn finalize(self: Box<Self>, status: PaymentStatus) -> Result<Payment, StoreError>;

    /// Release the lock without mutating the payment.
    async fn release(self: Box<Self>) -> Result<(), StoreError>;
}

/// A message claimed from a [`MessageChannel`], awaiting acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Channel-assigned receipt used to ack or reject this delivery.
    pub receipt: i64,
    /// Raw message payload (a payment id in canonical string form).
    pub body: String,
}

/// A durable at-least-once message queue with manual acknowledgment.
///
/// Duplicates and redelivery after a crash are normal behavior, not errors;
/// consumers must tolerate them. Messages stay claimed until acked or
/// rejected; rejection routes to a dead-letter destination and never
/// requeues.
#[async_trait]
pub trait MessageChannel: Send + Sync {
    /// Durably enqueue a message.
    async fn publish(&self, body: &str) -> Result<(), ChannelError>;

    /// Wait for the next delivery. Returns `Ok(None)` once the channel is
    /// closed and drained.
    async fn receive(&self) -> Result<Option<Delivery>, ChannelError>;

    /// Acknowledge a delivery, removing the message permanently.
    async fn ack(&self, delivery: &Delivery) -> Result<(), ChannelError>;

    /// Reject a delivery without requeue, routing it to the dead-letter
    /// destination with a reason for manual inspection.
    async fn reject(&self, delivery: &Delivery, reason: &str) -> Result<(), ChannelError>;
}
