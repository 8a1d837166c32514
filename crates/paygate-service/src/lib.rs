//! Paygate service: HTTP payment API and asynchronous processing worker.
//!
//! The HTTP side accepts payment-creation requests, persists them as
//! `PENDING`, and publishes the payment id onto a durable message channel.
//! The worker side consumes those messages and drives each payment through
//! its single idempotent transition to `SUCCESS` or `FAILED`, retrying
//! transient failures and dead-lettering the rest.

#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod processor;
pub mod routes;
pub mod service;
pub mod state;
pub mod worker;

pub use config::{ConfigError, ServiceConfig};
pub use processor::{CaptureSimulator, PaymentProcessor, ProcessOutcome, ProcessorError};
pub use routes::create_router;
pub use service::PaymentService;
pub use state::AppState;
pub use worker::Consumer;
