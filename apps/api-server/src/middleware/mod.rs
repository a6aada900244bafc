//! Middleware modules.

pub mod admin;
pub mod error;
pub mod rate_limit;

pub use admin::AdminAllowlistMiddleware;
pub use rate_limit::RateLimitMiddleware;
