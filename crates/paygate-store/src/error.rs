//! Error types for the storage and channel layer.

use paygate_core::PaymentError;

/// Errors from [`PaymentStore`](crate::PaymentStore) implementations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A payment with this reference already exists.
    #[error("payment with reference {reference:?} already exists")]
    DuplicateReference {
        /// The duplicated idempotency key.
        reference: String,
    },

    /// The database rejected or failed the operation.
    #[error("database error: {0}")]
    Database(String),

    /// A stored record could not be mapped back to a domain value.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}

/// Errors from [`MessageChannel`](crate::MessageChannel) implementations.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The channel is closed; no further deliveries or publishes.
    #[error("channel closed")]
    Closed,

    /// The backing queue store failed.
    #[error("database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for ChannelError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<StoreError> for PaymentError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateReference { reference } => Self::Conflict { reference },
            StoreError::Database(msg) => Self::Internal(msg),
            StoreError::Corrupt(msg) => Self::Internal(msg),
        }
    }
}

impl From<ChannelError> for PaymentError {
    fn from(err: ChannelError) -> Self {
        match err {
            ChannelError::Closed => Self::Internal("message channel closed".into()),
            ChannelError::Database(msg) => Self::Internal(msg),
        }
    }
}
