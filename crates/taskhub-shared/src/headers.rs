//! Response header names, in the lowercase form HTTP/2 and actix emit.
//!
//! Header names are case-insensitive; clients may read them as
//! `X-RateLimit-Limit`, `Retry-After`, etc.

pub const RATE_LIMIT_LIMIT: &str = "x-ratelimit-limit";
pub const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";
/// Unix seconds at which the window fully clears.
pub const RATE_LIMIT_RESET: &str = "x-ratelimit-reset";
pub const RETRY_AFTER: &str = "retry-after";
pub const REQUEST_ID: &str = "x-request-id";
