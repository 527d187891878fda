use super::InMemoryCache;
use crate::error::Result;
use crate::traits::cache::Cache;
use crate::utils::get_env_with_prefix;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Cache backend type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// Bounded in-memory cache (default)
    #[default]
    InMemory,
    /// Redis cache (requires the `redis` feature)
    #[cfg(feature = "redis")]
    Redis,
}

/// Backend selection for the persisted-query cache
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub backend: CacheBackend,

    /// Redis connection URL (only used for the Redis backend)
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Default TTL for cached values (in seconds)
    #[serde(default = "default_ttl_seconds")]
    pub default_ttl_seconds: u64,

    /// Maximum number of entries for the in-memory backend
    #[serde(default = "default_max_entries")]
    pub max_entries: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            redis_url: None,
            default_ttl_seconds: default_ttl_seconds(),
            max_entries: default_max_entries(),
        }
    }
}

impl CacheConfig {
    /// Bounded in-memory cache with the given capacity
    pub fn in_memory(max_entries: u64) -> Self {
        Self {
            max_entries,
            ..Self::default()
        }
    }

    #[cfg(feature = "redis")]
    pub fn redis(url: impl Into<String>) -> Self {
        Self {
            backend: CacheBackend::Redis,
            redis_url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Load cache configuration from environment variables
    ///
    /// Returns `None` when `CACHE_BACKEND` is unset.
    pub fn from_env() -> Option<Self> {
        let backend = get_env_with_prefix("CACHE_BACKEND")?;
        let mut config = Self::default();

        config.backend = match backend.to_lowercase().as_str() {
            "redis" => {
                #[cfg(feature = "redis")]
                {
                    CacheBackend::Redis
                }
                #[cfg(not(feature = "redis"))]
                {
                    tracing::warn!(
                        "Redis cache requested but the redis feature is not enabled, using in-memory"
                    );
                    CacheBackend::InMemory
                }
            }
            _ => CacheBackend::InMemory,
        };

        if let Some(url) = get_env_with_prefix("CACHE_REDIS_URL") {
            config.redis_url = Some(url);
        }

        if let Some(ttl) = get_env_with_prefix("CACHE_DEFAULT_TTL_SECONDS")
            && let Ok(seconds) = ttl.parse()
        {
            config.default_ttl_seconds = seconds;
        }

        if let Some(max) = get_env_with_prefix("CACHE_MAX_ENTRIES")
            && let Ok(entries) = max.parse()
        {
            config.max_entries = entries;
        }

        Some(config)
    }

    /// Instantiate the configured backend
    ///
    /// No connection is opened here; the Redis backend connects on first use.
    pub fn build(&self) -> Result<Arc<dyn Cache>> {
        let ttl = Duration::from_secs(self.default_ttl_seconds);
        match self.backend {
            CacheBackend::InMemory => Ok(Arc::new(InMemoryCache::with_ttl(self.max_entries, ttl))),
            #[cfg(feature = "redis")]
            CacheBackend::Redis => {
                let url = self
                    .redis_url
                    .as_deref()
                    .unwrap_or("redis://127.0.0.1:6379/");
                Ok(Arc::new(super::RedisCache::new(url, ttl)?))
            }
        }
    }
}

fn default_ttl_seconds() -> u64 {
    86400 // 24 hours
}

fn default_max_entries() -> u64 {
    1000
}
