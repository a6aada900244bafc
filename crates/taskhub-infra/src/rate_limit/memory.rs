//! In-memory window store - used as fallback when Redis is unavailable.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use taskhub_core::ports::{StoreError, WindowStore};

struct WindowRecord {
    hits: Vec<i64>,
    expires_at: i64,
}

#[derive(Default)]
struct Windows {
    records: HashMap<String, WindowRecord>,
    /// Time of the last expiry sweep done inside `record_hit`.
    last_sweep: Option<i64>,
}

impl Windows {
    /// A record expiring exactly at `now` may still hold a hit at the
    /// window start, which counts, so only strictly older ones go.
    fn purge_expired(&mut self, now: i64) -> usize {
        let before = self.records.len();
        self.records.retain(|_, record| record.expires_at >= now);
        self.last_sweep = Some(now);
        before - self.records.len()
    }
}

/// In-memory sliding-window log.
///
/// The whole trim/count/add/expire sequence runs under one mutex, which
/// gives the same per-key atomicity as a Redis transaction. Expired records
/// are swept from `record_hit` at most once per window, so memory stays
/// bounded without a background job.
/// Note: limits are per-process, not shared across instances.
pub struct InMemoryWindowStore {
    windows: Mutex<Windows>,
}

impl InMemoryWindowStore {
    pub fn new() -> Self {
        Self {
            windows: Mutex::new(Windows::default()),
        }
    }

    /// Drop records whose expiry has passed. Returns how many were removed.
    pub async fn purge_expired(&self, now: i64) -> usize {
        self.windows.lock().await.purge_expired(now)
    }

    /// Number of live and not-yet-purged records.
    pub async fn len(&self) -> usize {
        self.windows.lock().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for InMemoryWindowStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WindowStore for InMemoryWindowStore {
    async fn record_hit(&self, key: &str, now: i64, window: Duration) -> Result<u64, StoreError> {
        let window_secs = i64::try_from(window.as_secs()).unwrap_or(i64::MAX);
        let window_start = now.saturating_sub(window_secs);

        let mut windows = self.windows.lock().await;

        let last_sweep = windows.last_sweep;
        match last_sweep {
            Some(last) if now < last.saturating_add(window_secs) => {}
            Some(_) => {
                let removed = windows.purge_expired(now);
                if removed > 0 {
                    tracing::trace!(removed, "Swept expired rate limit windows");
                }
            }
            None => windows.last_sweep = Some(now),
        }

        let record = windows
            .records
            .entry(key.to_string())
            .or_insert_with(|| WindowRecord {
                hits: Vec::new(),
                expires_at: now,
            });

        record.hits.retain(|ts| *ts >= window_start);

        let prior = record.hits.len() as u64;
        record.hits.push(now);
        record.expires_at = now.saturating_add(window_secs);

        Ok(prior)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
