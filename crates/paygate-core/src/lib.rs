//! Core types for the paygate payment pipeline.
//!
//! This crate provides the foundational types used throughout paygate:
//!
//! - **Identifiers**: [`PaymentId`]
//! - **Payments**: [`Payment`], [`NewPayment`], [`PaymentStatus`], [`Currency`]
//! - **Errors**: [`PaymentError`]
//! - **Retry**: [`RetryPolicy`], [`DelayStrategy`]
//!
//! # Payment lifecycle
//!
//! A payment is created `PENDING`, queued for asynchronous processing, and
//! transitions exactly once to `SUCCESS` or `FAILED`. Terminal states never
//! transition again; reprocessing a finalized payment is reported as
//! [`PaymentError::AlreadyProcessed`], which consumers treat as success.
//!
//! Amounts are [`rust_decimal::Decimal`] throughout. Money never touches a
//! float.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod ids;
pub mod payment;
pub mod retry;

pub use error::{PaymentError, Result};
pub use ids::{IdError, PaymentId};
pub use payment::{Currency, NewPayment, Payment, PaymentStatus};
pub use retry::{DelayStrategy, RetryConfigError, RetryPolicy};
