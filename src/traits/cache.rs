//! Cache trait for key-value storage
//!
//! Session records and persisted GraphQL queries are both stored through this
//! trait, so the same backend can serve either role.

use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Object-safe byte cache with optional per-entry TTL
#[async_trait]
pub trait Cache: Send + Sync {
    /// Get the raw bytes stored under `key`
    ///
    /// Returns `Ok(None)` if the key doesn't exist or has expired.
    async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store `value` under `key`
    ///
    /// With `ttl: None` the backend's default TTL applies.
    async fn set_bytes(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()>;

    /// Delete a value from the cache
    async fn delete(&self, key: &str) -> Result<()>;

    /// Clear all values from the cache
    async fn clear(&self) -> Result<()>;

    /// Check if the cache backend is healthy
    fn is_healthy(&self) -> bool;
}
