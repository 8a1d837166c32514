//! HTTP request handlers.

pub mod health;
pub mod payments;
