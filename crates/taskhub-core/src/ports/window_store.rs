//! Windowed counter store port.

use async_trait::async_trait;
use std::time::Duration;

/// Store of per-key hit timestamps - abstraction over Redis and in-memory backends.
#[async_trait]
pub trait WindowStore: Send + Sync {
    /// Record one hit at `now` (unix seconds) and report the window's prior size.
    ///
    /// Implementations must perform these steps as ONE atomic operation:
    /// 1. drop hits with timestamp `< now - window`,
    /// 2. count the hits that remain,
    /// 3. add this hit,
    /// 4. expire the key `window` from now.
    ///
    /// Returns the count from step 2, excluding the hit just added.
    async fn record_hit(&self, key: &str, now: i64, window: Duration) -> Result<u64, StoreError>;

    /// Check that the backend is reachable.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Window store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Store command failed: {0}")]
    Command(String),
}
