//! In-memory cache implementation backed by moka
//!
//! Doubles as the connection-free session store client: it accepts listener
//! registration like a network client but never needs a connect step.

use crate::error::Result;
use crate::traits::cache::Cache;
use crate::traits::client::{CacheClient, CacheClientFactory, ClientListener, ListenerRegistry};
use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache as MokaCache;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default TTL for cache entries when none is specified (24 hours)
const DEFAULT_TTL: Duration = Duration::from_secs(86400);

/// Default capacity for caches created through [`InMemoryClientFactory`]
const DEFAULT_MAX_ENTRIES: u64 = 10_000;

#[derive(Clone)]
struct CacheEntry {
    value: Vec<u8>,
    /// Custom TTL for this entry, None means use default
    custom_ttl: Option<Duration>,
}

/// Per-entry TTL expiry policy
struct CacheExpiry {
    default_ttl: Duration,
}

impl Expiry<String, CacheEntry> for CacheExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.custom_ttl.unwrap_or(self.default_ttl))
    }

    fn expire_after_read(
        &self,
        _key: &String,
        _value: &CacheEntry,
        _read_at: Instant,
        duration_until_expiry: Option<Duration>,
        _last_modified_at: Instant,
    ) -> Option<Duration> {
        // Reads never extend an entry
        duration_until_expiry
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.custom_ttl.unwrap_or(self.default_ttl))
    }
}

/// Bounded in-memory cache backed by moka
///
/// Clones share the same storage, which lets tests hand a clone to a
/// [`StoreConnector`](crate::store::StoreConnector) and inspect what the
/// session layer wrote.
///
/// # Example
///
/// ```rust,ignore
/// use quayside::cache::InMemoryCache;
/// use quayside::traits::cache::Cache;
///
/// let cache = InMemoryCache::new(10_000);
/// cache.set_bytes("apq:abc", query.into_bytes(), None).await?;
/// ```
#[derive(Clone)]
pub struct InMemoryCache {
    inner: MokaCache<String, CacheEntry>,
    listeners: ListenerRegistry,
}

impl InMemoryCache {
    /// Create a new in-memory cache with the specified maximum number of entries
    pub fn new(max_entries: u64) -> Self {
        Self::with_ttl(max_entries, DEFAULT_TTL)
    }

    /// Create a cache with custom default TTL
    pub fn with_ttl(max_entries: u64, default_ttl: Duration) -> Self {
        let cache = MokaCache::builder()
            .max_capacity(max_entries)
            .expire_after(CacheExpiry { default_ttl })
            .build();

        Self {
            inner: cache,
            listeners: ListenerRegistry::new(),
        }
    }

    /// Run pending maintenance tasks (eviction, expiration)
    pub async fn run_pending_tasks(&self) {
        self.inner.run_pending_tasks().await;
    }

    /// Get the current number of entries in the cache
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }

    /// Keys currently held, in no particular order
    pub fn keys(&self) -> Vec<String> {
        self.inner.iter().map(|(key, _)| key.as_ref().clone()).collect()
    }

    /// Number of lifecycle listeners registered through [`CacheClient::on`]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.inner.get(key).await.map(|entry| entry.value))
    }

    async fn set_bytes(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let entry = CacheEntry {
            value,
            custom_ttl: ttl,
        };
        self.inner.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.inner.remove(key).await;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.inner.invalidate_all();
        self.inner.run_pending_tasks().await;
        Ok(())
    }

    fn is_healthy(&self) -> bool {
        true
    }
}

#[async_trait]
impl CacheClient for InMemoryCache {
    fn on(&self, listener: ClientListener) {
        self.listeners.register(listener);
    }

    fn requires_connect(&self) -> bool {
        false
    }

    async fn connect(&self) -> Result<()> {
        self.listeners.emit_connect();
        Ok(())
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

impl std::fmt::Debug for InMemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryCache")
            .field("entries", &self.inner.entry_count())
            .finish()
    }
}

/// Creates a fresh [`InMemoryCache`] per call; host and port are ignored
#[derive(Debug, Clone)]
pub struct InMemoryClientFactory {
    max_entries: u64,
}

impl InMemoryClientFactory {
    pub fn new(max_entries: u64) -> Self {
        Self { max_entries }
    }
}

impl Default for InMemoryClientFactory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

impl CacheClientFactory for InMemoryClientFactory {
    fn create_client(&self, host: &str, port: u16) -> Result<Arc<dyn CacheClient>> {
        tracing::debug!(host, port, "Using in-memory session store client");
        Ok(Arc::new(InMemoryCache::new(self.max_entries)))
    }
}
