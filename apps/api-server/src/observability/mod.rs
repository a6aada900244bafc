//! Observability module - request IDs and Prometheus metrics.

mod metrics;
mod request_id;

pub use metrics::Metrics;
pub use request_id::{RequestId, RequestIdMiddleware};
