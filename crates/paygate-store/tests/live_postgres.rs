//! Live PostgreSQL integration tests.
//!
//! These run against a real database and cover the locking and redelivery
//! behavior the in-memory backend can only approximate. Set
//! `PAYGATE_TEST_DATABASE_URL` (or `DATABASE_URL`) to a PostgreSQL
//! connection string.
//!
//! Run with: cargo test -p paygate-store --test live_postgres -- --ignored

use std::time::Duration;

use rust_decimal_macros::dec;
use sqlx::postgres::PgPool;
use uuid::Uuid;

use paygate_core::{NewPayment, Payment, PaymentStatus};
use paygate_store::{
    MessageChannel, PaymentStore, PgMessageChannel, PgPaymentStore, StoreError, MIGRATOR,
};

async fn pool() -> PgPool {
    let url = std::env::var("PAYGATE_TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .expect("set PAYGATE_TEST_DATABASE_URL to run live tests");
    let pool = PgPool::connect(&url)
        .await
        .expect("Failed to connect to test database");
    MIGRATOR.run(&pool).await.expect("Failed to apply migrations");
    pool
}

/// Payment with a unique reference so parallel runs never collide.
fn payment() -> Payment {
    let reference = format!("live-{}", Uuid::new_v4());
    Payment::create(NewPayment::new(dec!(100.50), "USD", &reference).unwrap())
}

/// Queue name unique to one test invocation.
fn unique_queue() -> String {
    format!("live-{}", Uuid::new_v4())
}

// ============================================================================
// Store
// ============================================================================

#[tokio::test]
#[ignore] // Run with --ignored flag
async fn live_insert_get_and_duplicate_reference() {
    let store = PgPaymentStore::new(pool().await);
    let p = payment();
    store.insert(&p).await.unwrap();

    let fetched = store.get(p.id).await.unwrap().unwrap();
    assert_eq!(fetched.id, p.id);
    assert_eq!(fetched.amount, p.amount);
    assert_eq!(fetched.status, PaymentStatus::Pending);

    let by_ref = store.get_by_reference(&p.reference).await.unwrap().unwrap();
    assert_eq!(by_ref.id, p.id);

    // The unique constraint backstops a racing create with the same
    // reference.
    let mut twin = payment();
    twin.reference = p.reference.clone();
    let err = store.insert(&twin).await.unwrap_err();
    assert!(matches!(err, StoreError::DuplicateReference { .. }));
}

#[tokio::test]
#[ignore]
async fn live_lock_serializes_concurrent_processing() {
    let pool = pool().await;
    let store = PgPaymentStore::new(pool.clone());
    let p = payment();
    store.insert(&p).await.unwrap();

    let first = store.lock(p.id).await.unwrap().unwrap();
    assert_eq!(first.payment().status, PaymentStatus::Pending);

    // A second lock on the same row must block server-side until the first
    // transaction ends.
    let contender = {
        let store = PgPaymentStore::new(pool);
        let id = p.id;
        tokio::spawn(async move { store.lock(id).await.unwrap().unwrap() })
    };
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(
        !contender.is_finished(),
        "second lock resolved while the first was held"
    );

    let finalized = first.finalize(PaymentStatus::Success).await.unwrap();
    assert_eq!(finalized.status, PaymentStatus::Success);

    // The late holder observes the committed terminal state.
    let second = contender.await.unwrap();
    assert_eq!(second.payment().status, PaymentStatus::Success);
    second.release().await.unwrap();
}

#[tokio::test]
#[ignore]
async fn live_release_leaves_payment_untouched() {
    let store = PgPaymentStore::new(pool().await);
    let p = payment();
    store.insert(&p).await.unwrap();

    let locked = store.lock(p.id).await.unwrap().unwrap();
    locked.release().await.unwrap();

    let stored = store.get(p.id).await.unwrap().unwrap();
    assert_eq!(stored.status, PaymentStatus::Pending);
    // No transition happened, so the transition timestamp was never
    // refreshed.
    assert_eq!(stored.updated_at, stored.created_at);
}

#[tokio::test]
#[ignore]
async fn live_lock_missing_payment_is_none() {
    let store = PgPaymentStore::new(pool().await);
    let locked = store.lock(paygate_core::PaymentId::generate()).await.unwrap();
    assert!(locked.is_none());
}

// ============================================================================
// Channel
// ============================================================================

#[tokio::test]
#[ignore]
async fn live_acked_message_is_not_redelivered() {
    let pool = pool().await;
    let channel = PgMessageChannel::new(
        pool,
        unique_queue(),
        Duration::from_millis(20),
        Duration::from_millis(100),
    );
    channel.publish("m1").await.unwrap();

    let delivery = channel.receive().await.unwrap().unwrap();
    assert_eq!(delivery.body, "m1");
    channel.ack(&delivery).await.unwrap();

    // Well past the visibility timeout, nothing comes back.
    let redelivery = tokio::time::timeout(Duration::from_millis(500), channel.receive()).await;
    assert!(redelivery.is_err(), "acked message was redelivered");
}

#[tokio::test]
#[ignore]
async fn live_unacked_claim_is_redelivered_after_visibility_timeout() {
    let pool = pool().await;
    let channel = PgMessageChannel::new(
        pool,
        unique_queue(),
        Duration::from_millis(20),
        Duration::from_millis(300),
    );
    channel.publish("m1").await.unwrap();

    // Claim but neither ack nor reject, as a crashed worker would.
    let first = channel.receive().await.unwrap().unwrap();
    assert_eq!(first.body, "m1");

    let second = tokio::time::timeout(Duration::from_secs(2), channel.receive())
        .await
        .expect("claim did not lapse after the visibility timeout")
        .unwrap()
        .unwrap();
    assert_eq!(second.body, "m1");
    assert_eq!(second.receipt, first.receipt);
    channel.ack(&second).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn live_deliveries_come_in_publish_order() {
    let pool = pool().await;
    let channel = PgMessageChannel::new(
        pool,
        unique_queue(),
        Duration::from_millis(20),
        Duration::from_secs(60),
    );
    channel.publish("a").await.unwrap();
    channel.publish("b").await.unwrap();

    let first = channel.receive().await.unwrap().unwrap();
    let second = channel.receive().await.unwrap().unwrap();
    assert_eq!(first.body, "a");
    assert_eq!(second.body, "b");
    channel.ack(&first).await.unwrap();
    channel.ack(&second).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn live_reject_moves_message_to_dead_letters() {
    let pool = pool().await;
    let queue = unique_queue();
    let channel = PgMessageChannel::new(
        pool.clone(),
        queue.clone(),
        Duration::from_millis(20),
        Duration::from_secs(60),
    );
    channel.publish("poison").await.unwrap();

    let delivery = channel.receive().await.unwrap().unwrap();
    channel.reject(&delivery, "retries exhausted").await.unwrap();

    let dead: (String, String) =
        sqlx::query_as("SELECT body, reason FROM payment_queue_dead WHERE queue = $1")
            .bind(&queue)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(dead.0, "poison");
    assert_eq!(dead.1, "retries exhausted");

    // The message is gone from the live queue.
    let remaining: i64 = sqlx::query_scalar("SELECT count(*) FROM payment_queue WHERE queue = $1")
        .bind(&queue)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(remaining, 0);
}
