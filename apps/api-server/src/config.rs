//! Application configuration loaded from environment variables.

use std::collections::HashSet;
use std::env;
use std::time::Duration;

use taskhub_core::admission::{DEFAULT_EXEMPT_PATHS, DEFAULT_TRUSTED_ADDRESSES};
use taskhub_core::{AdmissionConfig, EndpointPolicy, PolicyTable, RouteClass};
use taskhub_infra::RedisConfig;

#[cfg(feature = "scheduler")]
use crate::background::SchedulerConfig;

/// Per-route policy overrides: env var -> route class.
const POLICY_VARS: &[(&str, RouteClass)] = &[
    ("RATE_LIMIT_LOGIN", RouteClass::Login),
    ("RATE_LIMIT_REGISTER", RouteClass::Register),
    ("RATE_LIMIT_PROJECTS", RouteClass::Projects),
    ("RATE_LIMIT_TASKS", RouteClass::Tasks),
    ("RATE_LIMIT_DEFAULT", RouteClass::Other),
];

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub redis: RedisConfig,
    pub admission: AdmissionConfig,
    /// Resolve client addresses from `Forwarded`/`X-Forwarded-For`.
    pub trust_forwarded_for: bool,
    /// Addresses allowed under `/admin/`. Empty means unrestricted.
    pub admin_allowlist: HashSet<String>,
    #[cfg(feature = "scheduler")]
    pub scheduler: SchedulerConfig,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let lookup = |key: &str| env::var(key).ok();

        Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            redis: RedisConfig::from_env(),
            admission: admission_from(lookup),
            trust_forwarded_for: parse_flag(lookup("TRUST_FORWARDED_FOR"), false),
            admin_allowlist: lookup("ADMIN_ALLOWLIST")
                .map(|v| parse_list(&v).collect())
                .unwrap_or_default(),
            #[cfg(feature = "scheduler")]
            scheduler: SchedulerConfig::from_env(),
        }
    }
}

/// Build the admission config from a variable lookup.
///
/// Invalid values are logged and replaced by their defaults.
pub fn admission_from<F>(lookup: F) -> AdmissionConfig
where
    F: Fn(&str) -> Option<String>,
{
    let mut policies = PolicyTable::standard_builder();
    for (var, class) in POLICY_VARS {
        let Some(raw) = lookup(var) else { continue };
        match raw.parse::<EndpointPolicy>() {
            Ok(policy) => policies = policies.route(*class, policy),
            Err(e) => tracing::warn!(var = %var, value = %raw, error = %e, "Ignoring invalid rate limit policy"),
        }
    }

    let exempt_paths: Vec<String> = lookup("RATE_LIMIT_EXEMPT_PATHS")
        .map(|v| parse_list(&v).collect())
        .unwrap_or_else(|| DEFAULT_EXEMPT_PATHS.iter().map(|p| p.to_string()).collect());

    let trusted: Vec<String> = lookup("RATE_LIMIT_TRUSTED_IPS")
        .map(|v| parse_list(&v).collect())
        .unwrap_or_else(|| DEFAULT_TRUSTED_ADDRESSES.iter().map(|a| a.to_string()).collect());

    let mut config = AdmissionConfig::default()
        .with_policies(policies.build())
        .with_exempt_paths(exempt_paths)
        .with_trusted_addresses(trusted);

    if let Some(prefix) = lookup("RATE_LIMIT_KEY_PREFIX").filter(|p| !p.is_empty()) {
        config = config.with_key_prefix(prefix);
    }

    if let Some(raw) = lookup("RATE_LIMIT_STORE_TIMEOUT_MS") {
        match raw.parse::<u64>() {
            Ok(ms) if ms > 0 => config = config.with_store_timeout(Duration::from_millis(ms)),
            _ => tracing::warn!(value = %raw, "Ignoring invalid RATE_LIMIT_STORE_TIMEOUT_MS"),
        }
    }

    config
}

/// Comma-separated list, blanks dropped.
fn parse_list(value: &str) -> impl Iterator<Item = String> + '_ {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn parse_flag(value: Option<String>, default: bool) -> bool {
    value
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = admission_from(lookup_from(&[]));

        assert_eq!(config.policies.resolve(RouteClass::Login).to_string(), "5/60");
        assert_eq!(config.policies.resolve(RouteClass::Register).to_string(), "3/60");
        assert_eq!(config.policies.resolve(RouteClass::Other).to_string(), "100/60");
        assert!(config.exempt_paths.contains("/health"));
        assert!(config.trusted_addresses.contains("127.0.0.1"));
        assert_eq!(config.key_prefix, "rate_limit");
        assert_eq!(config.store_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_policy_overrides() {
        let config = admission_from(lookup_from(&[
            ("RATE_LIMIT_LOGIN", "10/30"),
            ("RATE_LIMIT_DEFAULT", "500/60"),
        ]));

        assert_eq!(config.policies.resolve(RouteClass::Login).to_string(), "10/30");
        assert_eq!(config.policies.resolve(RouteClass::Register).to_string(), "3/60");
        assert_eq!(config.policies.resolve(RouteClass::Other).to_string(), "500/60");
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = admission_from(lookup_from(&[
            ("RATE_LIMIT_TASKS", "lots"),
            ("RATE_LIMIT_STORE_TIMEOUT_MS", "0"),
        ]));

        assert_eq!(config.policies.resolve(RouteClass::Tasks).to_string(), "100/60");
        assert_eq!(config.store_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_lists_replace_defaults() {
        let config = admission_from(lookup_from(&[
            ("RATE_LIMIT_EXEMPT_PATHS", "/health/, /status"),
            ("RATE_LIMIT_TRUSTED_IPS", ""),
            ("RATE_LIMIT_KEY_PREFIX", "rl"),
        ]));

        assert!(config.exempt_paths.contains("/health"));
        assert!(config.exempt_paths.contains("/status"));
        assert!(!config.exempt_paths.contains("/metrics"));
        assert!(config.trusted_addresses.is_empty());
        assert_eq!(config.key_prefix, "rl");
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag(Some("TRUE".to_string()), false));
        assert!(!parse_flag(Some("0".to_string()), true));
        assert!(parse_flag(None, true));
    }
}
