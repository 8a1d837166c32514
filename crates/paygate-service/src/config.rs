//! Service configuration.
//!
//! Loaded once from the environment into an explicit value object that is
//! passed to constructors; nothing reads the environment past startup.

use std::time::Duration;

use paygate_core::{RetryConfigError, RetryPolicy};

/// Configuration for the API server and the worker.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// PostgreSQL connection string. Required.
    pub database_url: String,

    /// Logical queue name on the message channel
    /// (default: "payment_processing").
    pub queue_name: String,

    /// Retry policy applied by the consumer loop.
    pub retry: RetryPolicy,

    /// Deadline for a single external processing attempt.
    pub processing_timeout: Duration,

    /// How often an idle consumer re-polls the queue.
    pub queue_poll_interval: Duration,

    /// How long a claimed message stays invisible before redelivery.
    pub queue_visibility_timeout: Duration,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,
}

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// `DATABASE_URL` is not set.
    #[error("DATABASE_URL must be set")]
    MissingDatabaseUrl,

    /// `RETRY_DELAY_TYPE` is not a known strategy.
    #[error("invalid RETRY_DELAY_TYPE: {0}")]
    InvalidRetryStrategy(#[from] RetryConfigError),
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Fails when `DATABASE_URL` is missing or `RETRY_DELAY_TYPE` is
    /// neither `fixed` nor `backoff`. Other malformed values fall back to
    /// their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url =
            std::env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)?;

        let strategy = std::env::var("RETRY_DELAY_TYPE")
            .unwrap_or_else(|_| "fixed".into())
            .parse()?;

        let retry = RetryPolicy {
            attempts: env_parse("RETRY_ATTEMPTS", 3),
            strategy,
            base_delay: Duration::from_millis(env_parse("RETRY_DELAY_MS", 500)),
            max_delay: Duration::from_millis(env_parse("RETRY_MAX_DELAY_MS", 5000)),
        };

        Ok(Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            database_url,
            queue_name: std::env::var("QUEUE_NAME")
                .unwrap_or_else(|_| "payment_processing".into()),
            retry,
            processing_timeout: Duration::from_secs(env_parse("PROCESSING_TIMEOUT_SECONDS", 10)),
            queue_poll_interval: Duration::from_millis(env_parse("QUEUE_POLL_INTERVAL_MS", 250)),
            queue_visibility_timeout: Duration::from_secs(env_parse(
                "QUEUE_VISIBILITY_TIMEOUT_SECONDS",
                60,
            )),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            max_body_bytes: env_parse("MAX_BODY_BYTES", 1024 * 1024),
            request_timeout_seconds: env_parse("REQUEST_TIMEOUT_SECONDS", 30),
        })
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(name, raw = %raw, "ignoring unparseable value, using default");
                default
            }
        },
        Err(_) => default,
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            database_url: "postgres://localhost/paygate".into(),
            queue_name: "payment_processing".into(),
            retry: RetryPolicy::default(),
            processing_timeout: Duration::from_secs(10),
            queue_poll_interval: Duration::from_millis(250),
            queue_visibility_timeout: Duration::from_secs(60),
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Each test uses its own variable name; env vars are process-global.

    #[test]
    fn env_parse_reads_valid_value() {
        std::env::set_var("PAYGATE_CFG_VALID", "7");
        assert_eq!(env_parse("PAYGATE_CFG_VALID", 3u32), 7);
        std::env::remove_var("PAYGATE_CFG_VALID");
    }

    #[test]
    fn env_parse_defaults_when_unset() {
        assert_eq!(env_parse("PAYGATE_CFG_UNSET", 3u32), 3);
    }

    #[test]
    fn env_parse_defaults_on_malformed_value() {
        std::env::set_var("PAYGATE_CFG_MALFORMED", "abc");
        assert_eq!(env_parse("PAYGATE_CFG_MALFORMED", 3u32), 3);
        std::env::remove_var("PAYGATE_CFG_MALFORMED");
    }
}
