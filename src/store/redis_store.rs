//! Redis-backed session store.

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::store::{ScanPage, SessionStore};
use crate::types::{SessionToken, StoreKey};

/// Session store reading records mirrored into Redis by the login system.
///
/// A single multiplexed, auto-reconnecting connection is shared by all
/// requests. It is established on first use, so the sidecar starts even when
/// Redis is down and fails closed until it comes back.
pub struct RedisSessionStore {
    client: redis::Client,
    connection: OnceCell<ConnectionManager>,
    address: String,
}

impl RedisSessionStore {
    /// Create a store for the given address. Does not connect yet.
    pub fn new(config: &StoreConfig) -> Result<Self, StoreError> {
        let client = redis::Client::open(config.connection_info())?;

        Ok(Self {
            client,
            connection: OnceCell::new(),
            address: config.address(),
        })
    }

    /// `host:port` of the Redis server.
    pub fn address(&self) -> &str {
        &self.address
    }

    async fn connection(&self) -> Result<ConnectionManager, StoreError> {
        let manager = self
            .connection
            .get_or_try_init(|| async {
                debug!(address = %self.address, "Connecting to Redis");
                let manager = ConnectionManager::new(self.client.clone())
                    .await
                    .map_err(|e| StoreError::Unavailable(e.to_string()))?;
                info!(address = %self.address, "Connected to Redis");
                Ok::<_, StoreError>(manager)
            })
            .await?;

        Ok(manager.clone())
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    fn name(&self) -> &str {
        "redis"
    }

    async fn scan_page(
        &self,
        cursor: u64,
        pattern: &str,
        count: Option<usize>,
    ) -> Result<ScanPage, StoreError> {
        let mut conn = self.connection().await?;

        let mut cmd = redis::cmd("SCAN");
        cmd.arg(cursor).arg("MATCH").arg(pattern);
        if let Some(count) = count {
            cmd.arg("COUNT").arg(count);
        }

        let (next_cursor, keys): (u64, Vec<String>) = cmd.query_async(&mut conn).await?;

        Ok(ScanPage {
            next_cursor,
            keys: keys.into_iter().map(StoreKey::from).collect(),
        })
    }

    async fn get(&self, key: &StoreKey) -> Result<Option<SessionToken>, StoreError> {
        let mut conn = self.connection().await?;
        let value: Option<String> = conn.get(key.as_str()).await?;
        Ok(value.map(SessionToken::from))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let reply: String = redis::cmd("PING").query_async(&mut conn).await?;

        if reply == "PONG" {
            Ok(())
        } else {
            Err(StoreError::Protocol(format!("unexpected PING reply: {}", reply)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // No Redis server in unit tests; construction never touches the network.

    #[test]
    fn test_new_does_not_connect() {
        let config = StoreConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            ..Default::default()
        };
        let store = RedisSessionStore::new(&config).unwrap();
        assert_eq!(store.name(), "redis");
        assert_eq!(store.address(), "127.0.0.1:1");
        assert!(store.connection.get().is_none());
    }
}
