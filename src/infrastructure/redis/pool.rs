//! Redis connection pool for the document store backend.
//!
//! Holds one multiplexed connection shared by all tasks and re-establishes
//! it lazily after the server drops it.

use std::sync::atomic::{AtomicBool, Ordering};

use redis::aio::MultiplexedConnection;
use redis::{Client, RedisError, RedisResult};
use tokio::sync::RwLock;

use crate::config::RedisConfig;

/// Error type for Redis pool operations.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// Redis operation failed
    #[error("Redis error: {0}")]
    Redis(#[from] RedisError),
}

/// Redis connection pool for data operations.
///
/// Unlike the Pub/Sub subscriber which uses a dedicated connection,
/// this pool uses a multiplexed connection suitable for commands.
pub struct RedisPool {
    /// Redis client for creating connections
    client: Client,

    /// Multiplexed connection (shared across tasks)
    connection: RwLock<Option<MultiplexedConnection>>,

    /// Whether the last command reached the server
    connected: AtomicBool,
}

impl RedisPool {
    /// Create a new Redis pool. No connection is opened until first use.
    pub fn new(config: RedisConfig) -> Result<Self, PoolError> {
        let client = Client::open(config.url.as_str())?;

        Ok(Self {
            client,
            connection: RwLock::new(None),
            connected: AtomicBool::new(false),
        })
    }

    /// Get a connection from the pool, establishing one if needed.
    pub async fn get_connection(&self) -> Result<MultiplexedConnection, PoolError> {
        {
            let conn = self.connection.read().await;
            if let Some(ref c) = *conn {
                return Ok(c.clone());
            }
        }

        self.connect().await
    }

    async fn connect(&self) -> Result<MultiplexedConnection, PoolError> {
        let mut conn_guard = self.connection.write().await;

        // Double-check in case another task connected while we waited
        if let Some(ref c) = *conn_guard {
            return Ok(c.clone());
        }

        match self.client.get_multiplexed_tokio_connection().await {
            Ok(conn) => {
                *conn_guard = Some(conn.clone());
                self.connected.store(true, Ordering::Relaxed);
                tracing::info!("Redis pool connection established");
                Ok(conn)
            }
            Err(e) => {
                self.connected.store(false, Ordering::Relaxed);
                tracing::error!(error = %e, "Failed to connect to Redis");
                Err(PoolError::Redis(e))
            }
        }
    }

    /// Execute a Redis command, dropping the cached connection on I/O failure
    /// so the next call reconnects.
    pub async fn execute<F, T, Fut>(&self, f: F) -> Result<T, PoolError>
    where
        F: FnOnce(MultiplexedConnection) -> Fut,
        Fut: std::future::Future<Output = RedisResult<T>>,
    {
        let conn = self.get_connection().await?;

        match f(conn).await {
            Ok(result) => {
                self.connected.store(true, Ordering::Relaxed);
                Ok(result)
            }
            Err(e) => {
                if e.is_connection_dropped() || e.is_io_error() {
                    let mut conn_guard = self.connection.write().await;
                    *conn_guard = None;
                    self.connected.store(false, Ordering::Relaxed);
                }
                Err(PoolError::Redis(e))
            }
        }
    }

    /// Whether the most recent operation reached Redis.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Ping Redis to check connectivity.
    pub async fn ping(&self) -> Result<(), PoolError> {
        self.execute(|mut conn| async move {
            redis::cmd("PING").query_async::<String>(&mut conn).await
        })
        .await
        .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_creation_is_lazy() {
        let pool = RedisPool::new(RedisConfig::default()).unwrap();
        assert!(!pool.is_connected());
    }

    #[test]
    fn test_invalid_url_rejected() {
        let config = RedisConfig {
            url: "not a url".to_string(),
            ..RedisConfig::default()
        };
        assert!(RedisPool::new(config).is_err());
    }
}
