//! Cache backends for session storage and persisted queries.
//!
//! In-memory caching is always available; Redis support comes with the
//! `redis` feature.

mod config;
mod in_memory;

#[cfg(feature = "redis")]
mod redis;

pub use config::{CacheBackend, CacheConfig};
pub use in_memory::{InMemoryCache, InMemoryClientFactory};

#[cfg(feature = "redis")]
pub use redis::{RedisCache, RedisClientFactory};
