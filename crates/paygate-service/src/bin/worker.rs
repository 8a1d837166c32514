//! Paygate worker - consumes queued payments and processes them.

use std::sync::Arc;

use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use paygate_service::{CaptureSimulator, Consumer, PaymentService, ServiceConfig};
use paygate_store::{PgMessageChannel, PgPaymentStore, MIGRATOR};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    "info,paygate_service=debug,paygate_store=debug,paygate_core=debug".into()
                }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting paygate worker");

    let config = ServiceConfig::from_env()?;
    tracing::info!(
        queue = %config.queue_name,
        retry_attempts = config.retry.attempts,
        "Worker configuration loaded"
    );

    let pool = sqlx::PgPool::connect(&config.database_url).await?;
    // Idempotent; lets the worker start on a fresh database without
    // waiting for the API binary.
    MIGRATOR.run(&pool).await?;

    let store = Arc::new(PgPaymentStore::new(pool.clone()));
    let channel = Arc::new(PgMessageChannel::new(
        pool,
        config.queue_name.clone(),
        config.queue_poll_interval,
        config.queue_visibility_timeout,
    ));
    let service = Arc::new(PaymentService::new(
        store,
        channel.clone(),
        Arc::new(CaptureSimulator::default()),
        config.processing_timeout,
    ));

    let consumer = Consumer::new(service, channel, config.retry.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutting down worker");
            let _ = shutdown_tx.send(true);
        }
    });

    consumer.run(shutdown_rx).await?;
    Ok(())
}
