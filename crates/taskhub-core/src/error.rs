//! Domain-level error types.

use thiserror::Error;

/// Invalid rate-limit policy definitions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("max requests must be at least 1")]
    ZeroRequests,

    #[error("window must be at least 1 second")]
    ZeroWindow,

    #[error("Invalid policy '{0}', expected <max_requests>/<window_secs>")]
    Malformed(String),
}
