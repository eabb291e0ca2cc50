//! Error types for store access and configuration.

use thiserror::Error;

/// Errors raised while talking to the session store.
///
/// Every variant is fatal for the validation that hit it: the validator maps
/// them to a denied verdict and never to "authorized".
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store command failed: {0}")]
    Command(#[from] redis::RedisError),

    #[error("Store returned an unexpected reply: {0}")]
    Protocol(String),

    #[error("Store call exceeded the request deadline")]
    DeadlineExceeded,

    #[error("Store call cancelled")]
    Cancelled,
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}
