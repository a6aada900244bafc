//! Data Transfer Objects - response types for the operational endpoints.

use serde::{Deserialize, Serialize};

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `healthy` or `unhealthy`.
    pub status: String,
    pub version: String,
    pub timestamp: String,
    /// `connected` or `unreachable`.
    pub store: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One row of the active rate-limit table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicySummary {
    pub route: String,
    pub max_requests: u32,
    pub window_secs: u64,
}

/// Root index listing the operational endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceIndex {
    pub message: String,
    pub version: String,
    pub health: String,
    pub metrics: String,
    pub rate_limits: Vec<PolicySummary>,
}
