//! Application state.

use std::sync::Arc;

use crate::config::ServiceConfig;
use crate::service::PaymentService;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The payment service orchestrating store and channel.
    pub service: Arc<PaymentService>,

    /// Service configuration.
    pub config: ServiceConfig,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(service: Arc<PaymentService>, config: ServiceConfig) -> Self {
        Self { service, config }
    }
}
