use crate::cache::{CacheConfig, InMemoryCache};
use crate::config::{DeploymentMode, ServerConfig};
use crate::traits::cache::Cache;
use async_graphql::extensions::apollo_persisted_queries::CacheStorage;
use async_trait::async_trait;
use std::sync::Arc;

const KEY_PREFIX: &str = "apq:";

/// Capacity of the fallback persisted-query cache
pub const DEFAULT_PERSISTED_QUERY_ENTRIES: u64 = 1000;

/// Persisted-query storage over any [`Cache`] backend
///
/// Lookups that fail at the backend are treated as misses so the client
/// falls back to sending the full query.
#[derive(Clone)]
pub struct PersistedQueryStore {
    backend: Arc<dyn Cache>,
}

impl PersistedQueryStore {
    pub fn new(backend: Arc<dyn Cache>) -> Self {
        Self { backend }
    }

    /// Pick the backend for `mode`
    ///
    /// Only production honours `cache_backend`; everything else, and any
    /// backend that fails to build, uses a bounded in-memory cache.
    pub fn for_config(config: &ServerConfig, mode: DeploymentMode) -> Self {
        let fallback = || -> Arc<dyn Cache> { Arc::new(InMemoryCache::new(DEFAULT_PERSISTED_QUERY_ENTRIES)) };

        let backend = match (&config.cache_backend, mode) {
            (Some(cache), DeploymentMode::Production) => build_or_fallback(cache, fallback),
            _ => fallback(),
        };

        Self::new(backend)
    }
}

fn build_or_fallback(cache: &CacheConfig, fallback: impl FnOnce() -> Arc<dyn Cache>) -> Arc<dyn Cache> {
    match cache.build() {
        Ok(backend) => backend,
        Err(e) => {
            tracing::warn!(error = %e, "Persisted-query cache unavailable, using in-memory cache");
            fallback()
        }
    }
}

#[async_trait]
impl CacheStorage for PersistedQueryStore {
    async fn get(&self, key: String) -> Option<String> {
        match self.backend.get_bytes(&format!("{}{}", KEY_PREFIX, key)).await {
            Ok(bytes) => bytes.and_then(|bytes| String::from_utf8(bytes).ok()),
            Err(e) => {
                tracing::warn!(error = %e, "Persisted-query lookup failed");
                None
            }
        }
    }

    async fn set(&self, key: String, query: String) {
        if let Err(e) = self
            .backend
            .set_bytes(&format!("{}{}", KEY_PREFIX, key), query.into_bytes(), None)
            .await
        {
            tracing::warn!(error = %e, "Failed to store persisted query");
        }
    }
}
