//! In-memory implementations of the store and channel contracts.
//!
//! These back integration tests and demos. The store reproduces the
//! concurrency semantics of the PostgreSQL backend (per-payment exclusive
//! locks, unique references); the channel is process-local and therefore
//! not durable, but it preserves the manual-ack and dead-letter contract.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;
use tokio::sync::Mutex as AsyncMutex;
use tokio::sync::OwnedMutexGuard;

use paygate_core::{Payment, PaymentId, PaymentStatus};

use crate::error::{ChannelError, StoreError};
use crate::{Delivery, LockedPayment, MessageChannel, PaymentStore};

#[derive(Default)]
struct State {
    payments: HashMap<PaymentId, Payment>,
    by_reference: HashMap<String, PaymentId>,
}

struct Inner {
    state: Mutex<State>,
    // One async mutex per payment id, standing in for the row lock.
    row_locks: Mutex<HashMap<PaymentId, Arc<AsyncMutex<()>>>>,
}

/// [`PaymentStore`] held entirely in memory.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::default()),
                row_locks: Mutex::new(HashMap::new()),
            }),
        }
    }

    fn row_lock(&self, id: PaymentId) -> Arc<AsyncMutex<()>> {
        let mut locks = self.inner.row_locks.lock().expect("row lock map poisoned");
        // An entry referenced only by the map has no holder and no waiter
        // (both keep a clone of the Arc), so it can be dropped. Keeps the
        // map bounded by the number of concurrently locked ids.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        Arc::clone(locks.entry(id).or_default())
    }
}

#[async_trait]
impl PaymentStore for MemoryStore {
    async fn insert(&self, payment: &Payment) -> Result<(), StoreError> {
        let mut state = self.inner.state.lock().expect("state poisoned");
        if state.by_reference.contains_key(&payment.reference) {
            return Err(StoreError::DuplicateReference {
                reference: payment.reference.clone(),
            });
        }
        state
            .by_reference
            .insert(payment.reference.clone(), payment.id);
        state.payments.insert(payment.id, payment.clone());
        Ok(())
    }

    async fn get(&self, id: PaymentId) -> Result<Option<Payment>, StoreError> {
        let state = self.inner.state.lock().expect("state poisoned");
        Ok(state.payments.get(&id).cloned())
    }

    async fn get_by_reference(&self, reference: &str) -> Result<Option<Payment>, StoreError> {
        let state = self.inner.state.lock().expect("state poisoned");
        let id = state.by_reference.get(reference);
        Ok(id.and_then(|id| state.payments.get(id)).cloned())
    }

    async fn lock(&self, id: PaymentId) -> Result<Option<Box<dyn LockedPayment>>, StoreError> {
        let row_lock = self.row_lock(id);
        let guard = row_lock.lock_owned().await;

        let payment = {
            let state = self.inner.state.lock().expect("state poisoned");
            state.payments.get(&id).cloned()
        };
        match payment {
            None => Ok(None),
            Some(payment) => Ok(Some(Box::new(MemoryLockedPayment {
                payment,
                inner: Arc::clone(&self.inner),
                _guard: guard,
            }))),
        }
    }
}

struct MemoryLockedPayment {
    payment: Payment,
    inner: Arc<Inner>,
    _guard: OwnedMutexGuard<()>,
}

#[async_trait]
impl LockedPayment for MemoryLockedPayment {
    fn payment(&self) -> &Payment {
        &self.payment
    }

    async fn finalize(self: Box<Self>, status: PaymentStatus) -> Result<Payment, StoreError> {
        let mut state = self.inner.state.lock().expect("state poisoned");
        let stored = state
            .payments
            .get_mut(&self.payment.id)
            .ok_or_else(|| StoreError::Corrupt(format!("payment {} vanished", self.payment.id)))?;
        stored.status = status;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn release(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

/// A message parked on the dead-letter destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetter {
    /// The rejected message payload.
    pub body: String,
    /// Why the consumer gave up on it.
    pub reason: String,
}

struct ChannelInner {
    tx: mpsc::UnboundedSender<Delivery>,
    rx: AsyncMutex<mpsc::UnboundedReceiver<Delivery>>,
    seq: AtomicI64,
    acked: Mutex<Vec<String>>,
    dead: Mutex<Vec<DeadLetter>>,
}

/// Process-local [`MessageChannel`] with inspectable outcomes.
///
/// Tests assert on [`acked`](Self::acked) and
/// [`dead_letters`](Self::dead_letters) after driving the consumer.
#[derive(Clone)]
pub struct MemoryChannel {
    inner: Arc<ChannelInner>,
}

impl Default for MemoryChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryChannel {
    /// Create an empty channel.
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(ChannelInner {
                tx,
                rx: AsyncMutex::new(rx),
                seq: AtomicI64::new(0),
                acked: Mutex::new(Vec::new()),
                dead: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Bodies of every acknowledged message, in ack order.
    #[must_use]
    pub fn acked(&self) -> Vec<String> {
        self.inner.acked.lock().expect("ack log poisoned").clone()
    }

    /// Every dead-lettered message, in rejection order.
    #[must_use]
    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.inner.dead.lock().expect("dead letters poisoned").clone()
    }
}

#[async_trait]
impl MessageChannel for MemoryChannel {
    async fn publish(&self, body: &str) -> Result<(), ChannelError> {
        let receipt = self.inner.seq.fetch_add(1, Ordering::Relaxed);
        self.inner
            .tx
            .send(Delivery {
                receipt,
                body: body.to_owned(),
            })
            .map_err(|_| ChannelError::Closed)
    }

    async fn receive(&self) -> Result<Option<Delivery>, ChannelError> {
        let mut rx = self.inner.rx.lock().await;
        Ok(rx.recv().await)
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), ChannelError> {
        self.inner
            .acked
            .lock()
            .expect("ack log poisoned")
            .push(delivery.body.clone());
        Ok(())
    }

    async fn reject(&self, delivery: &Delivery, reason: &str) -> Result<(), ChannelError> {
        self.inner.dead.lock().expect("dead letters poisoned").push(DeadLetter {
            body: delivery.body.clone(),
            reason: reason.to_owned(),
        });
        Ok(())
    }
}
