//! Common test utilities for paygate integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum_test::TestServer;

use paygate_core::{Payment, RetryPolicy};
use paygate_service::{
    create_router, AppState, CaptureSimulator, PaymentProcessor, PaymentService, ProcessOutcome,
    ProcessorError, ServiceConfig,
};
use paygate_store::{MemoryChannel, MemoryStore};

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// The service, for driving processing directly.
    pub service: Arc<PaymentService>,
    /// The backing store, for direct state assertions.
    pub store: MemoryStore,
    /// The channel, for inspecting acks and dead letters.
    pub channel: MemoryChannel,
    /// The retry policy handed to consumers in tests (fast delays).
    pub retry: RetryPolicy,
}

impl TestHarness {
    /// Harness with a fast always-approving processor.
    pub fn new() -> Self {
        Self::with_processor(
            Arc::new(CaptureSimulator::new(Duration::from_millis(1))),
            Duration::from_secs(2),
        )
    }

    /// Harness with a custom processor and processing deadline.
    pub fn with_processor(
        processor: Arc<dyn PaymentProcessor>,
        processing_timeout: Duration,
    ) -> Self {
        let store = MemoryStore::new();
        let channel = MemoryChannel::new();

        let service = Arc::new(PaymentService::new(
            Arc::new(store.clone()),
            Arc::new(channel.clone()),
            processor,
            processing_timeout,
        ));

        let state = AppState::new(Arc::clone(&service), ServiceConfig::default());
        let router: Router = create_router(state);
        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            service,
            store,
            channel,
            retry: fast_retry(),
        }
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// A retry policy with millisecond delays so tests stay fast.
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        attempts: 3,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(10),
        ..RetryPolicy::default()
    }
}

/// Processor whose downstream always refuses the payment.
pub struct DecliningProcessor;

#[async_trait]
impl PaymentProcessor for DecliningProcessor {
    async fn execute(&self, _payment: &Payment) -> Result<ProcessOutcome, ProcessorError> {
        Ok(ProcessOutcome::Declined {
            reason: "insufficient funds".into(),
        })
    }
}

/// Processor whose downstream is never reachable (transient failure).
pub struct UnavailableProcessor;

#[async_trait]
impl PaymentProcessor for UnavailableProcessor {
    async fn execute(&self, _payment: &Payment) -> Result<ProcessOutcome, ProcessorError> {
        Err(ProcessorError("connection refused".into()))
    }
}

/// Processor that outlives any reasonable deadline.
pub struct SlowProcessor(pub Duration);

#[async_trait]
impl PaymentProcessor for SlowProcessor {
    async fn execute(&self, _payment: &Payment) -> Result<ProcessOutcome, ProcessorError> {
        tokio::time::sleep(self.0).await;
        Ok(ProcessOutcome::Captured)
    }
}
