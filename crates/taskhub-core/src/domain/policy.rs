//! Endpoint policies and route classification.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::PolicyError;

/// Versioned API prefix that classified routes live under.
pub const API_PREFIX: &str = "/api/v1";

/// Route classes that can carry their own rate-limit policy.
///
/// Resolved from the normalised request path, so `/api/v1/projects`,
/// `/api/v1/projects/` and `/api/v1/projects/42` all share one class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteClass {
    Login,
    Register,
    Projects,
    Tasks,
    Other,
}

impl RouteClass {
    /// Classify a request path.
    pub fn classify(path: &str) -> Self {
        let path = normalize_path(path);

        let rest = match path.strip_prefix(API_PREFIX) {
            Some("") => return RouteClass::Other,
            Some(rest) if rest.starts_with('/') => &rest[1..],
            _ => return RouteClass::Other,
        };

        let mut segments = rest.split('/');
        match (segments.next(), segments.next(), segments.next()) {
            (Some("auth"), Some("login"), None) => RouteClass::Login,
            (Some("auth"), Some("register"), None) => RouteClass::Register,
            (Some("projects"), _, _) => RouteClass::Projects,
            (Some("tasks"), _, _) => RouteClass::Tasks,
            _ => RouteClass::Other,
        }
    }

    /// Stable label used in storage keys and metrics.
    ///
    /// `Other` has no label of its own; keys fall back to the path.
    pub fn label(&self) -> Option<&'static str> {
        match self {
            RouteClass::Login => Some("auth:login"),
            RouteClass::Register => Some("auth:register"),
            RouteClass::Projects => Some("projects"),
            RouteClass::Tasks => Some("tasks"),
            RouteClass::Other => None,
        }
    }

    /// Label for metrics, where unclassified routes collapse into one series.
    pub fn metric_label(&self) -> &'static str {
        self.label().unwrap_or("other")
    }
}

impl fmt::Display for RouteClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.metric_label())
    }
}

/// Collapse duplicate slashes and strip the trailing one.
///
/// The root path stays `/`; a missing leading slash is added.
pub fn normalize_path(path: &str) -> String {
    let mut normalized = String::with_capacity(path.len() + 1);
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        normalized.push('/');
        normalized.push_str(segment);
    }

    if normalized.is_empty() {
        normalized.push('/');
    }
    normalized
}

/// Maximum requests allowed within a sliding window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointPolicy {
    max_requests: u32,
    window: Duration,
}

impl EndpointPolicy {
    pub fn new(max_requests: u32, window_secs: u64) -> Result<Self, PolicyError> {
        if max_requests == 0 {
            return Err(PolicyError::ZeroRequests);
        }
        if window_secs == 0 {
            return Err(PolicyError::ZeroWindow);
        }

        Ok(Self {
            max_requests,
            window: Duration::from_secs(window_secs),
        })
    }

    /// Const constructor for the built-in table. Callers guarantee non-zero values.
    const fn fixed(max_requests: u32, window_secs: u64) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn window_secs(&self) -> u64 {
        self.window.as_secs()
    }
}

impl FromStr for EndpointPolicy {
    type Err = PolicyError;

    /// Parse `"<max_requests>/<window_secs>"`, e.g. `"5/60"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || PolicyError::Malformed(s.to_string());

        let (max, window) = s.split_once('/').ok_or_else(malformed)?;
        let max = max.trim().parse::<u32>().map_err(|_| malformed())?;
        let window = window.trim().parse::<u64>().map_err(|_| malformed())?;

        Self::new(max, window)
    }
}

impl fmt::Display for EndpointPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.max_requests, self.window_secs())
    }
}

/// Immutable mapping from route class to policy.
#[derive(Debug, Clone)]
pub struct PolicyTable {
    routes: HashMap<RouteClass, EndpointPolicy>,
    default: EndpointPolicy,
}

impl PolicyTable {
    pub const DEFAULT_POLICY: EndpointPolicy = EndpointPolicy::fixed(100, 60);

    pub fn builder() -> PolicyTableBuilder {
        PolicyTableBuilder::default()
    }

    /// The stock table: tight limits in front of authentication,
    /// looser ones for the resource collections.
    pub fn standard() -> Self {
        Self::standard_builder().build()
    }

    /// Builder pre-loaded with the stock table, for selective overrides.
    pub fn standard_builder() -> PolicyTableBuilder {
        Self::builder()
            .route(RouteClass::Login, EndpointPolicy::fixed(5, 60))
            .route(RouteClass::Register, EndpointPolicy::fixed(3, 60))
            .route(RouteClass::Projects, EndpointPolicy::fixed(50, 60))
            .route(RouteClass::Tasks, EndpointPolicy::fixed(100, 60))
    }

    /// Policy for a route class, falling back to the default.
    pub fn resolve(&self, class: RouteClass) -> EndpointPolicy {
        self.routes.get(&class).copied().unwrap_or(self.default)
    }

    pub fn default_policy(&self) -> EndpointPolicy {
        self.default
    }

    /// Explicit entries, for diagnostics.
    pub fn routes(&self) -> impl Iterator<Item = (RouteClass, EndpointPolicy)> + '_ {
        self.routes.iter().map(|(class, policy)| (*class, *policy))
    }
}

impl Default for PolicyTable {
    fn default() -> Self {
        Self::standard()
    }
}

#[derive(Debug, Clone)]
pub struct PolicyTableBuilder {
    routes: HashMap<RouteClass, EndpointPolicy>,
    default: EndpointPolicy,
}

impl Default for PolicyTableBuilder {
    fn default() -> Self {
        Self {
            routes: HashMap::new(),
            default: PolicyTable::DEFAULT_POLICY,
        }
    }
}

impl PolicyTableBuilder {
    /// Set the policy for a class. Setting `Other` replaces the default.
    pub fn route(mut self, class: RouteClass, policy: EndpointPolicy) -> Self {
        if class == RouteClass::Other {
            self.default = policy;
        } else {
            self.routes.insert(class, policy);
        }
        self
    }

    pub fn default_policy(mut self, policy: EndpointPolicy) -> Self {
        self.default = policy;
        self
    }

    pub fn build(self) -> PolicyTable {
        PolicyTable {
            routes: self.routes,
            default: self.default,
        }
    }
}
