//! Paygate API - HTTP entry point for payment creation and lookup.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use paygate_service::{create_router, AppState, CaptureSimulator, PaymentService, ServiceConfig};
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

    tracing::info!("Starting paygate API");

    let config = ServiceConfig::from_env()?;
    tracing::info!(
        listen_addr = %config.listen_addr,
        queue = %config.queue_name,
        "Service configuration loaded"
    );

    let pool = sqlx::PgPool::connect(&config.database_url).await?;
    MIGRATOR.run(&pool).await?;
    tracing::info!("Migrations applied");

    let store = Arc::new(PgPaymentStore::new(pool.clone()));
    let channel = Arc::new(PgMessageChannel::new(
        pool,
        config.queue_name.clone(),
        config.queue_poll_interval,
        config.queue_visibility_timeout,
    ));
    let service = Arc::new(PaymentService::new(
        store,
        channel,
        Arc::new(CaptureSimulator::default()),
        config.processing_timeout,
    ));

    let state = AppState::new(service, config.clone());
    let app = create_router(state);

    tracing::info!(listen_addr = %config.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        return;
    }
    tracing::info!("shutdown signal received");
}
