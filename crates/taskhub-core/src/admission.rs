//! Admission controller - sliding-window rate limiting per (client, endpoint).
//!
//! Every decision re-reads the window from the store through one atomic
//! `record_hit` call. The controller keeps no counters of its own, so
//! concurrent requests for the same key are serialised by the store alone.
//! If the store errors or does not answer within `store_timeout`, the
//! request is admitted (fail open).

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::{
    ClientIdentity, Decision, EndpointPolicy, LimiterKey, PolicyTable, RouteClass, normalize_path,
};
use crate::ports::{Clock, StoreError, SystemClock, WindowStore};

/// Paths that bypass admission entirely.
pub const DEFAULT_EXEMPT_PATHS: &[&str] = &["/health", "/metrics", "/docs", "/redoc", "/openapi.json"];

/// Source addresses that bypass admission entirely. Compared against
/// textual IP addresses, so host names never match.
pub const DEFAULT_TRUSTED_ADDRESSES: &[&str] = &["127.0.0.1", "::1"];

/// Admission controller configuration.
#[derive(Debug, Clone)]
pub struct AdmissionConfig {
    pub policies: PolicyTable,
    /// Normalised paths exempt from rate limiting.
    pub exempt_paths: HashSet<String>,
    /// Source addresses exempt from rate limiting.
    pub trusted_addresses: HashSet<String>,
    /// Prefix for store keys.
    pub key_prefix: String,
    /// Upper bound on one store round-trip.
    pub store_timeout: Duration,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            policies: PolicyTable::standard(),
            exempt_paths: DEFAULT_EXEMPT_PATHS.iter().map(|p| p.to_string()).collect(),
            trusted_addresses: DEFAULT_TRUSTED_ADDRESSES
                .iter()
                .map(|a| a.to_string())
                .collect(),
            key_prefix: "rate_limit".to_string(),
            store_timeout: Duration::from_millis(250),
        }
    }
}

impl AdmissionConfig {
    pub fn with_policies(mut self, policies: PolicyTable) -> Self {
        self.policies = policies;
        self
    }

    pub fn with_exempt_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.exempt_paths = paths
            .into_iter()
            .map(|p| normalize_path(p.as_ref()))
            .collect();
        self
    }

    pub fn with_trusted_addresses<I, S>(mut self, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.trusted_addresses = addresses.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }
}

/// The parts of a request admission looks at.
#[derive(Debug, Clone, Copy)]
pub struct RequestFacts<'a> {
    pub path: &'a str,
    pub source_ip: Option<&'a str>,
    pub user_agent: Option<&'a str>,
}

/// Decides ADMIT or REJECT for each request.
pub struct AdmissionController {
    store: Arc<dyn WindowStore>,
    clock: Arc<dyn Clock>,
    config: AdmissionConfig,
}

impl AdmissionController {
    pub fn new(store: Arc<dyn WindowStore>, clock: Arc<dyn Clock>, config: AdmissionConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    /// Controller on the real wall clock.
    pub fn with_system_clock(store: Arc<dyn WindowStore>, config: AdmissionConfig) -> Self {
        Self::new(store, Arc::new(SystemClock), config)
    }

    pub fn config(&self) -> &AdmissionConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn WindowStore> {
        &self.store
    }

    /// Whether the request skips admission (no store access, no headers).
    pub fn is_exempt(&self, path: &str, source_ip: Option<&str>) -> bool {
        if self.config.exempt_paths.contains(&normalize_path(path)) {
            return true;
        }

        source_ip
            .map(|ip| self.config.trusted_addresses.contains(ip))
            .unwrap_or(false)
    }

    /// Policy that applies to a path.
    pub fn policy_for(&self, path: &str) -> EndpointPolicy {
        self.config.policies.resolve(RouteClass::classify(path))
    }

    /// Evaluate one request. Never fails: store problems turn into `FailOpen`.
    pub async fn evaluate(&self, request: &RequestFacts<'_>) -> Decision {
        let class = RouteClass::classify(request.path);
        let policy = self.config.policies.resolve(class);
        let client = ClientIdentity::derive(request.source_ip, request.user_agent);
        let key = LimiterKey::new(client, class, request.path);
        let storage_key = key.storage_key(&self.config.key_prefix);

        let now = self.clock.now_secs();
        let window_secs = i64::try_from(policy.window_secs()).unwrap_or(i64::MAX);
        let reset_at = now.saturating_add(window_secs);
        let limit = policy.max_requests();

        let prior = match self.record(&storage_key, now, policy.window()).await {
            Ok(prior) => prior,
            Err(e) => {
                tracing::warn!(
                    key = %storage_key,
                    error = %e,
                    "Rate limit store failed, failing open"
                );
                return Decision::FailOpen { limit, reset_at };
            }
        };

        let current = u32::try_from(prior.saturating_add(1)).unwrap_or(u32::MAX);

        if current <= limit {
            tracing::trace!(key = %storage_key, current, limit, "Request admitted");
            Decision::Admit {
                current,
                limit,
                reset_at,
            }
        } else {
            tracing::info!(
                client = %key.client(),
                endpoint = %key.endpoint(),
                current,
                limit,
                "Rate limit exceeded"
            );
            Decision::Reject {
                limit,
                reset_at,
                retry_after: (reset_at - now).max(1) as u64,
            }
        }
    }

    async fn record(&self, key: &str, now: i64, window: Duration) -> Result<u64, StoreError> {
        let timeout = self.config.store_timeout;

        tokio::time::timeout(timeout, self.store.record_hit(key, now, window))
            .await
            .map_err(|_| StoreError::Timeout(timeout))?
    }
}
