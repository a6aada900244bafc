//! Window store implementations.

mod memory;

pub use memory::InMemoryWindowStore;

#[cfg(feature = "redis")]
mod redis;
#[cfg(feature = "redis")]
pub use self::redis::RedisWindowStore;
