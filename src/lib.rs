// Core modules
mod config;
mod error;
mod types;

pub mod api;
pub mod auth;
pub mod store;

// Re-export key types and functions
pub use auth::{CookieMatch, DenyReason, SessionValidator, Verdict};
pub use config::{DEFAULT_TIMEOUT_MS, StoreConfig, ValidatorConfig};
pub use error::{ConfigError, StoreError};
pub use store::{MemorySessionStore, RedisSessionStore, SessionStore};
pub use types::{CandidateCookie, SessionToken, StoreKey};

use std::sync::Arc;
use anyhow::Result;
use axum::Router;
use tokio_util::sync::CancellationToken;

/// Convenience function to create a validator backed by Redis.
///
/// No connection is made here; the store connects on the first lookup.
pub fn create_validator(store: &StoreConfig, config: ValidatorConfig) -> Result<Arc<SessionValidator>> {
    let store = RedisSessionStore::new(store)?;
    Ok(Arc::new(SessionValidator::new(Arc::new(store), config)))
}

/// Build the HTTP application around a validator.
///
/// Cancelling `shutdown` aborts every in-flight store lookup.
pub fn create_app(validator: Arc<SessionValidator>, shutdown: CancellationToken) -> Router {
    api::create_router(Arc::new(api::AppState::new(validator, shutdown)))
}
