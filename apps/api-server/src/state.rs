//! Application state - shared across all handlers.

use std::sync::Arc;

use taskhub_core::AdmissionController;
use taskhub_core::ports::WindowStore;
use taskhub_infra::InMemoryWindowStore;

use crate::config::AppConfig;
use crate::observability::Metrics;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<AdmissionController>,
    pub metrics: Arc<Metrics>,
    /// Set when running on the in-memory store, so the sweep job can reach it.
    pub memory_store: Option<Arc<InMemoryWindowStore>>,
}

impl AppState {
    /// Build the application state, connecting to Redis when available.
    pub async fn new(config: &AppConfig) -> anyhow::Result<Self> {
        let (store, memory_store) = build_store(config).await?;
        let controller = AdmissionController::with_system_clock(store, config.admission.clone());

        tracing::info!(
            key_prefix = %controller.config().key_prefix,
            default_policy = %controller.config().policies.default_policy(),
            "Application state initialized"
        );

        Ok(Self {
            memory_store,
            ..Self::from_controller(controller)?
        })
    }

    /// State around an existing controller.
    pub fn from_controller(controller: AdmissionController) -> anyhow::Result<Self> {
        Ok(Self {
            controller: Arc::new(controller),
            metrics: Arc::new(Metrics::new()?),
            memory_store: None,
        })
    }

    pub fn store(&self) -> &Arc<dyn WindowStore> {
        self.controller.store()
    }
}

type Stores = (Arc<dyn WindowStore>, Option<Arc<InMemoryWindowStore>>);

fn memory_stores() -> Stores {
    let memory = Arc::new(InMemoryWindowStore::new());
    (memory.clone(), Some(memory))
}

#[cfg(feature = "redis")]
async fn build_store(config: &AppConfig) -> anyhow::Result<Stores> {
    use taskhub_infra::RedisWindowStore;

    match RedisWindowStore::new(config.redis.clone()).await {
        Ok(store) => Ok((Arc::new(store), None)),
        Err(e) if config.redis.fallback_to_memory => {
            tracing::warn!(
                error = %e,
                "Redis unavailable, using in-memory window store (limits are per-process)"
            );
            Ok(memory_stores())
        }
        Err(e) => Err(anyhow::anyhow!("failed to connect to Redis: {e}")),
    }
}

#[cfg(not(feature = "redis"))]
async fn build_store(_config: &AppConfig) -> anyhow::Result<Stores> {
    tracing::info!("Running without redis feature - using in-memory window store");
    Ok(memory_stores())
}
