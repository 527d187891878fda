use crate::error::{Error, Result};
use crate::traits::cache::Cache;
use crate::traits::client::{CacheClient, CacheClientFactory, ClientListener, ListenerRegistry};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Redis cache implementation
///
/// The multiplexed connection is opened by [`CacheClient::connect`] or lazily by the
/// first command, then reused. A failed command drops the cached connection so
/// the next one reconnects.
#[derive(Clone)]
pub struct RedisCache {
    client: redis::Client,
    default_ttl: Duration,
    connection: Arc<Mutex<Option<MultiplexedConnection>>>,
    listeners: ListenerRegistry,
}

impl RedisCache {
    /// Create a new Redis cache from a connection URL
    pub fn new(url: &str, default_ttl: Duration) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| Error::cache(format!("Failed to create Redis client: {}", e)))?;

        Ok(Self {
            client,
            default_ttl,
            connection: Arc::new(Mutex::new(None)),
            listeners: ListenerRegistry::new(),
        })
    }

    /// Create a client for `redis://{host}:{port}/`
    pub fn from_host_port(host: &str, port: u16, default_ttl: Duration) -> Result<Self> {
        Self::new(&format!("redis://{}:{}/", host, port), default_ttl)
    }

    async fn get_connection(&self) -> Result<MultiplexedConnection> {
        let mut guard = self.connection.lock().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }

        match self.client.get_multiplexed_async_connection().await {
            Ok(conn) => {
                *guard = Some(conn.clone());
                drop(guard);
                tracing::info!(addr = %self.client.get_connection_info().addr, "Connected to Redis");
                self.listeners.emit_connect();
                Ok(conn)
            }
            Err(e) => {
                let err = Error::cache(format!("Failed to get Redis connection: {}", e));
                self.listeners.emit_error(&err);
                Err(err)
            }
        }
    }

    /// Map a command failure, forgetting the connection when it is no longer usable
    async fn command_failed(&self, command: &str, e: redis::RedisError) -> Error {
        if e.is_connection_dropped() || e.is_io_error() || e.is_timeout() {
            *self.connection.lock().await = None;
        }
        let err = Error::cache(format!("Redis {} failed: {}", command, e));
        self.listeners.emit_error(&err);
        err
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.get_connection().await?;

        match redis::cmd("GET")
            .arg(key)
            .query_async::<Option<Vec<u8>>>(&mut conn)
            .await
        {
            Ok(value) => Ok(value),
            Err(e) => Err(self.command_failed("GET", e).await),
        }
    }

    async fn set_bytes(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.get_connection().await?;

        // SETEX rejects a zero expiry
        let ttl_secs = ttl.unwrap_or(self.default_ttl).as_secs().max(1);

        match redis::cmd("SETEX")
            .arg(key)
            .arg(ttl_secs)
            .arg(value)
            .query_async::<()>(&mut conn)
            .await
        {
            Ok(()) => Ok(()),
            Err(e) => Err(self.command_failed("SETEX", e).await),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.get_connection().await?;

        match redis::cmd("DEL").arg(key).query_async::<()>(&mut conn).await {
            Ok(()) => Ok(()),
            Err(e) => Err(self.command_failed("DEL", e).await),
        }
    }

    async fn clear(&self) -> Result<()> {
        let mut conn = self.get_connection().await?;

        match redis::cmd("FLUSHDB").query_async::<()>(&mut conn).await {
            Ok(()) => Ok(()),
            Err(e) => Err(self.command_failed("FLUSHDB", e).await),
        }
    }

    fn is_healthy(&self) -> bool {
        self.connection
            .try_lock()
            .map(|conn| conn.is_some())
            .unwrap_or(true)
    }
}

#[async_trait]
impl CacheClient for RedisCache {
    fn on(&self, listener: ClientListener) {
        self.listeners.register(listener);
    }

    async fn connect(&self) -> Result<()> {
        self.get_connection().await.map(|_| ())
    }
}

impl std::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache")
            .field("addr", &self.client.get_connection_info().addr)
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

/// Creates [`RedisCache`] clients for the session store
#[derive(Debug, Clone)]
pub struct RedisClientFactory {
    default_ttl: Duration,
}

impl RedisClientFactory {
    pub fn new(default_ttl: Duration) -> Self {
        Self { default_ttl }
    }
}

impl Default for RedisClientFactory {
    fn default() -> Self {
        Self::new(Duration::from_secs(86400))
    }
}

impl CacheClientFactory for RedisClientFactory {
    fn create_client(&self, host: &str, port: u16) -> Result<Arc<dyn CacheClient>> {
        Ok(Arc::new(RedisCache::from_host_port(host, port, self.default_ttl)?))
    }
}
