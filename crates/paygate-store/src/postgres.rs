//! PostgreSQL implementations of the store and channel contracts.
//!
//! The payment table relies on two database guarantees: a unique constraint
//! on `reference` to enforce idempotent creation, and `SELECT ... FOR UPDATE`
//! to serialize concurrent processing attempts per payment.
//!
//! The channel is a queue table claimed with `FOR UPDATE SKIP LOCKED`.
//! Claimed messages carry a `locked_at` stamp; a claim that is neither acked
//! nor rejected becomes eligible again after the visibility timeout, which is
//! what makes delivery at-least-once across worker crashes.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgPool;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use paygate_core::{Payment, PaymentId, PaymentStatus};

use crate::error::{ChannelError, StoreError};
use crate::{Delivery, LockedPayment, MessageChannel, PaymentStore};

/// Embedded schema migrations, applied at service startup.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

const PAYMENT_COLUMNS: &str = "id, amount, currency, reference, status, created_at, updated_at";

/// Row shape of the `payments` table.
#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    amount: Decimal,
    currency: String,
    reference: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = StoreError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        let currency = row
            .currency
            .parse()
            .map_err(|_| StoreError::Corrupt(format!("currency {:?}", row.currency)))?;
        let status = row
            .status
            .parse()
            .map_err(|_| StoreError::Corrupt(format!("status {:?}", row.status)))?;
        Ok(Self {
            id: PaymentId::from_uuid(row.id),
            amount: row.amount,
            currency,
            reference: row.reference,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// [`PaymentStore`] backed by PostgreSQL.
#[derive(Clone)]
pub struct PgPaymentStore {
    pool: PgPool,
}

impl PgPaymentStore {
    /// Create a store on an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PaymentStore for PgPaymentStore {
    async fn insert(&self, payment: &Payment) -> Result<(), StoreError> {
        let result = sqlx::query(
            "INSERT INTO payments (id, amount, currency, reference, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(payment.id.as_uuid())
        .bind(payment.amount)
        .bind(payment.currency.as_str())
        .bind(&payment.reference)
        .bind(payment.status.as_str())
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            // A racing insert with the same reference loses to the unique
            // constraint; report it as the same conflict the pre-check does.
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::DuplicateReference {
                    reference: payment.reference.clone(),
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn get(&self, id: PaymentId) -> Result<Option<Payment>, StoreError> {
        let row: Option<PaymentRow> =
            sqlx::query_as(&format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1"))
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;
        row.map(Payment::try_from).transpose()
    }

    async fn get_by_reference(&self, reference: &str) -> Result<Option<Payment>, StoreError> {
        let row: Option<PaymentRow> = sqlx::query_as(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE reference = $1"
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Payment::try_from).transpose()
    }

    async fn lock(&self, id: PaymentId) -> Result<Option<Box<dyn LockedPayment>>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let row: Option<PaymentRow> = sqlx::query_as(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?;

        match row {
            None => {
                tx.rollback().await?;
                Ok(None)
            }
            Some(row) => {
                let payment = Payment::try_from(row)?;
                Ok(Some(Box::new(PgLockedPayment { payment, tx })))
            }
        }
    }
}

/// A payment row held under `FOR UPDATE` inside an open transaction.
///
/// Dropping the guard drops the transaction, which rolls back and releases
/// the row lock without mutating anything.
struct PgLockedPayment {
    payment: Payment,
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LockedPayment for PgLockedPayment {
    fn payment(&self) -> &Payment {
        &self.payment
    }

    async fn finalize(self: Box<Self>, status: PaymentStatus) -> Result<Payment, StoreError> {
        let mut this = *self;
        let row: PaymentRow = sqlx::query_as(&format!(
            "UPDATE payments SET status = $1, updated_at = now() WHERE id = $2 \
             RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(status.as_str())
        .bind(this.payment.id.as_uuid())
        .fetch_one(&mut *this.tx)
        .await?;
        this.tx.commit().await?;
        Payment::try_from(row)
    }

    async fn release(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

/// [`MessageChannel`] backed by a PostgreSQL queue table.
#[derive(Clone)]
pub struct PgMessageChannel {
    pool: PgPool,
    queue: String,
    poll_interval: Duration,
    visibility_timeout: Duration,
}

impl PgMessageChannel {
    /// Create a channel on an existing pool.
    ///
    /// `queue` names the logical queue within the shared table;
    /// `poll_interval` bounds how often an idle consumer re-polls;
    /// `visibility_timeout` is how long a claimed message stays invisible
    /// before it is considered abandoned and becomes deliverable again.
    #[must_use]
    pub fn new(
        pool: PgPool,
        queue: impl Into<String>,
        poll_interval: Duration,
        visibility_timeout: Duration,
    ) -> Self {
        Self {
            pool,
            queue: queue.into(),
            poll_interval,
            visibility_timeout,
        }
    }

    async fn claim_next(&self) -> Result<Option<Delivery>, ChannelError> {
        let row: Option<(i64, String)> = sqlx::query_as(
            "WITH next AS ( \
                 SELECT id FROM payment_queue \
                 WHERE queue = $1 \
                   AND (locked_at IS NULL OR locked_at < now() - make_interval(secs => $2)) \
                 ORDER BY id \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             UPDATE payment_queue q SET locked_at = now() \
             FROM next WHERE q.id = next.id \
             RETURNING q.id, q.body",
        )
        .bind(&self.queue)
        .bind(self.visibility_timeout.as_secs_f64())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(receipt, body)| Delivery { receipt, body }))
    }
}

#[async_trait]
impl MessageChannel for PgMessageChannel {
    async fn publish(&self, body: &str) -> Result<(), ChannelError> {
        sqlx::query("INSERT INTO payment_queue (queue, body) VALUES ($1, $2)")
            .bind(&self.queue)
            .bind(body)
            .execute(&self.pool)
            .await?;
        tracing::debug!(queue = %self.queue, body, "message published");
        Ok(())
    }

    async fn receive(&self) -> Result<Option<Delivery>, ChannelError> {
        loop {
            if let Some(delivery) = self.claim_next().await? {
                return Ok(Some(delivery));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), ChannelError> {
        sqlx::query("DELETE FROM payment_queue WHERE id = $1")
            .bind(delivery.receipt)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn reject(&self, delivery: &Delivery, reason: &str) -> Result<(), ChannelError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO payment_queue_dead (queue, body, reason) \
             SELECT queue, body, $2 FROM payment_queue WHERE id = $1",
        )
        .bind(delivery.receipt)
        .bind(reason)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM payment_queue WHERE id = $1")
            .bind(delivery.receipt)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        tracing::warn!(
            queue = %self.queue,
            receipt = delivery.receipt,
            reason,
            "message dead-lettered"
        );
        Ok(())
    }
}
