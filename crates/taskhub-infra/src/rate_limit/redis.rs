//! Redis window store using a sorted set per key.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, RedisError};
use uuid::Uuid;

use taskhub_core::ports::{StoreError, WindowStore};

use crate::config::RedisConfig;

/// Redis-backed sliding-window log.
///
/// Each hit is a sorted-set member scored by its timestamp. Trim, count,
/// add and expire run in one MULTI/EXEC transaction.
pub struct RedisWindowStore {
    conn: ConnectionManager,
}

impl RedisWindowStore {
    pub async fn new(config: RedisConfig) -> Result<Self, StoreError> {
        let client = Client::open(config.url.as_str()).map_err(map_redis_error)?;

        // Use timeout to prevent hanging if Redis is unreachable
        let conn_manager_fut = ConnectionManager::new(client);
        let conn = tokio::time::timeout(config.connect_timeout, conn_manager_fut)
            .await
            .map_err(|_| StoreError::Timeout(config.connect_timeout))?
            .map_err(map_redis_error)?;

        tracing::info!(url = %config.url, "Connected to Redis window store");

        Ok(Self { conn })
    }

    /// Create from environment configuration.
    pub async fn from_env() -> Result<Self, StoreError> {
        Self::new(RedisConfig::from_env()).await
    }
}

fn map_redis_error(e: RedisError) -> StoreError {
    if e.is_io_error() || e.is_connection_refusal() || e.is_connection_dropped() || e.is_timeout() {
        StoreError::Unavailable(e.to_string())
    } else {
        StoreError::Command(e.to_string())
    }
}

#[async_trait]
impl WindowStore for RedisWindowStore {
    async fn record_hit(&self, key: &str, now: i64, window: Duration) -> Result<u64, StoreError> {
        let window_secs = i64::try_from(window.as_secs()).unwrap_or(i64::MAX).max(1);
        let window_start = now.saturating_sub(window_secs);
        // Unique member so several hits in the same second all count.
        let member = format!("{}-{}", now, Uuid::new_v4().simple());
        let mut conn = self.conn.clone();

        let (prior,): (u64,) = redis::pipe()
            .atomic()
            .zrembyscore(key, "-inf", format!("({}", window_start))
            .ignore()
            .zcard(key)
            .zadd(key, &member, now)
            .ignore()
            .expire(key, window_secs)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;

        Ok(prior)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;
        Ok(())
    }
}
