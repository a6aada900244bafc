//! Cron-style job scheduler using tokio-cron-scheduler.

use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use taskhub_core::ports::{Clock, SystemClock};
use taskhub_infra::InMemoryWindowStore;

const DEFAULT_SWEEP_SCHEDULE: &str = "0 * * * * *";

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Enable scheduler.
    pub enabled: bool,
    /// Cron expression (with seconds) for the in-memory window sweep.
    pub sweep_schedule: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sweep_schedule: DEFAULT_SWEEP_SCHEDULE.to_string(),
        }
    }
}

impl SchedulerConfig {
    pub fn from_env() -> Self {
        Self {
            enabled: std::env::var("SCHEDULER_ENABLED")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(true),
            sweep_schedule: std::env::var("RATE_LIMIT_SWEEP_SCHEDULE")
                .unwrap_or_else(|_| DEFAULT_SWEEP_SCHEDULE.to_string()),
        }
    }
}

/// Cron job scheduler wrapper.
pub struct Scheduler {
    inner: JobScheduler,
    config: SchedulerConfig,
}

impl Scheduler {
    /// Create a new scheduler.
    pub async fn new(config: SchedulerConfig) -> Result<Self, JobSchedulerError> {
        let inner = JobScheduler::new().await?;
        Ok(Self { inner, config })
    }

    /// Add a cron job.
    pub async fn add_cron<F, Fut>(
        &self,
        schedule: &str,
        task: F,
    ) -> Result<uuid::Uuid, JobSchedulerError>
    where
        F: Fn() -> Fut + Send + Sync + Clone + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let job = Job::new_async(schedule, move |_uuid, _lock| {
            let task = task.clone();
            Box::pin(async move {
                task().await;
            })
        })?;

        let id = self.inner.add(job).await?;
        tracing::info!(schedule = %schedule, job_id = %id, "Cron job registered");
        Ok(id)
    }

    /// Periodically drop expired windows from the in-memory store.
    ///
    /// Redis expires keys on its own; only the fallback store needs this.
    pub async fn add_window_sweep(
        &self,
        store: Arc<InMemoryWindowStore>,
    ) -> Result<uuid::Uuid, JobSchedulerError> {
        let schedule = self.config.sweep_schedule.clone();

        self.add_cron(&schedule, move || {
            let store = store.clone();
            async move {
                let removed = store.purge_expired(SystemClock.now_secs()).await;
                if removed > 0 {
                    tracing::debug!(removed, "Swept expired rate limit windows");
                }
            }
        })
        .await
    }

    /// Start the scheduler.
    pub async fn start(&self) -> Result<(), JobSchedulerError> {
        if !self.config.enabled {
            tracing::info!("Scheduler disabled");
            return Ok(());
        }

        self.inner.start().await?;
        tracing::info!("Scheduler started");
        Ok(())
    }

    /// Stop the scheduler.
    pub async fn shutdown(&mut self) -> Result<(), JobSchedulerError> {
        self.inner.shutdown().await?;
        tracing::info!("Scheduler stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_registers_window_sweep() {
        let scheduler = Scheduler::new(SchedulerConfig::default()).await.unwrap();
        let store = Arc::new(InMemoryWindowStore::new());

        assert!(scheduler.add_window_sweep(store).await.is_ok());
    }

    #[tokio::test]
    async fn test_rejects_bad_schedule() {
        let config = SchedulerConfig {
            enabled: true,
            sweep_schedule: "every minute".to_string(),
        };
        let scheduler = Scheduler::new(config).await.unwrap();

        assert!(
            scheduler
                .add_window_sweep(Arc::new(InMemoryWindowStore::new()))
                .await
                .is_err()
        );
    }
}
