//! # Taskhub Infrastructure
//!
//! Concrete implementations of the ports defined in `taskhub-core`.
//!
//! ## Feature Flags
//!
//! - `redis` (default) - Redis sorted-set window store
//! - without `redis` (`default-features = false`) - in-memory store only

pub mod config;
pub mod rate_limit;

pub use config::RedisConfig;
pub use rate_limit::InMemoryWindowStore;

#[cfg(feature = "redis")]
pub use rate_limit::RedisWindowStore;
