use super::options::{StoreConnectionOptions, ValidatedOptions};
use super::session_store::CacheSessionStore;
use crate::cache::InMemoryClientFactory;
use crate::config::DeploymentMode;
use crate::error::{Error, StoreError};
use crate::session::SessionConfig;
use crate::traits::client::{CacheClientFactory, ClientListener};
use std::sync::Arc;

/// What the session layer hands to a connector when it needs a store
#[derive(Debug, Clone)]
pub struct SessionCapability {
    key_prefix: String,
}

impl SessionCapability {
    pub fn new(key_prefix: impl Into<String>) -> Self {
        Self {
            key_prefix: key_prefix.into(),
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.key_prefix.clone())
    }

    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }
}

impl Default for SessionCapability {
    fn default() -> Self {
        Self::new("sess:")
    }
}

/// Validated, not-yet-connected session store
///
/// Construction checks the options and fails before any client exists;
/// [`connect`](Self::connect) does the I/O.
///
/// # Example
///
/// ```rust,ignore
/// use quayside::store::{StoreConnectionOptions, StoreConnector};
///
/// let connector = StoreConnector::redis(Some(
///     StoreConnectionOptions::new("localhost", 6379)
///         .on_connect(|| tracing::info!("session store connected"))
///         .on_error(|err| tracing::error!(error = %err, "session store error")),
/// ))?;
/// ```
#[derive(Clone)]
pub struct StoreConnector {
    options: ValidatedOptions,
    factory: Arc<dyn CacheClientFactory>,
}

impl StoreConnector {
    pub fn new<F>(options: Option<StoreConnectionOptions>, factory: F) -> Result<Self, StoreError>
    where
        F: CacheClientFactory + 'static,
    {
        let options = options.ok_or(StoreError::InvalidArgument)?.validate()?;
        Ok(Self {
            options,
            factory: Arc::new(factory),
        })
    }

    /// Connector whose clients are in-process [`InMemoryCache`](crate::cache::InMemoryCache)s
    pub fn in_memory(options: Option<StoreConnectionOptions>) -> Result<Self, StoreError> {
        Self::new(options, InMemoryClientFactory::default())
    }

    /// Connector backed by Redis at the configured host and port
    #[cfg(feature = "redis")]
    pub fn redis(options: Option<StoreConnectionOptions>) -> Result<Self, StoreError> {
        Self::new(options, crate::cache::RedisClientFactory::default())
    }

    /// In-memory clients in development, Redis in production
    pub fn for_mode(
        options: Option<StoreConnectionOptions>,
        mode: DeploymentMode,
    ) -> Result<Self, StoreError> {
        match mode {
            DeploymentMode::Development => Self::in_memory(options),
            #[cfg(feature = "redis")]
            DeploymentMode::Production => Self::redis(options),
            #[cfg(not(feature = "redis"))]
            DeploymentMode::Production => {
                tracing::warn!("redis feature disabled, production session store is in-memory");
                Self::in_memory(options)
            }
        }
    }

    pub fn host(&self) -> &str {
        &self.options.host
    }

    pub fn port(&self) -> u16 {
        self.options.port
    }

    /// Create the client, wire its listeners and connect it
    ///
    /// Connection failures and timeouts go to `on_error` and still yield a
    /// store. Only a client that cannot be constructed at all is an error.
    pub async fn connect(
        &self,
        capability: &SessionCapability,
    ) -> Result<CacheSessionStore, StoreError> {
        let ValidatedOptions {
            host,
            port,
            on_connect,
            on_error,
            connect_timeout,
        } = &self.options;

        let client = self
            .factory
            .create_client(host, *port)
            .map_err(|e| StoreError::Client(e.to_string()))?;

        // Listeners go on before connecting so early events are not lost
        client.on(ClientListener::Error(on_error.clone()));
        client.on(ClientListener::Connect(on_connect.clone()));

        if client.requires_connect() {
            match tokio::time::timeout(*connect_timeout, client.connect()).await {
                Ok(Ok(())) => {
                    tracing::debug!(host = %host, port, "Session store connected");
                }
                Ok(Err(err)) => {
                    tracing::warn!(host = %host, port, error = %err, "Session store connection failed");
                }
                Err(_) => {
                    let err = Error::Store(StoreError::ConnectTimeout(*connect_timeout));
                    tracing::warn!(host = %host, port, error = %err, "Session store connection timed out");
                    on_error(&err);
                }
            }
        }

        Ok(CacheSessionStore::new(client, capability.key_prefix()))
    }
}

impl std::fmt::Debug for StoreConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConnector")
            .field("host", &self.options.host)
            .field("port", &self.options.port)
            .field("connect_timeout", &self.options.connect_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::traits::cache::Cache;
    use crate::traits::client::{CacheClient, ListenerRegistry};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Client that records the order of lifecycle calls
    #[derive(Clone, Default)]
    struct RecordingClient {
        calls: Arc<Mutex<Vec<&'static str>>>,
        listeners: ListenerRegistry,
        fail_connect: bool,
        hang_connect: bool,
    }

    #[async_trait]
    impl Cache for RecordingClient {
        async fn get_bytes(&self, _key: &str) -> Result<Option<Vec<u8>>> {
            Ok(None)
        }
        async fn set_bytes(&self, _key: &str, _value: Vec<u8>, _ttl: Option<Duration>) -> Result<()> {
            Ok(())
        }
        async fn delete(&self, _key: &str) -> Result<()> {
            Ok(())
        }
        async fn clear(&self) -> Result<()> {
            Ok(())
        }
        fn is_healthy(&self) -> bool {
            true
        }
    }

    #[async_trait]
    impl CacheClient for RecordingClient {
        fn on(&self, listener: ClientListener) {
            self.calls.lock().unwrap().push(match listener {
                ClientListener::Connect(_) => "on:connect",
                ClientListener::Error(_) => "on:error",
            });
            self.listeners.register(listener);
        }

        async fn connect(&self) -> Result<()> {
            self.calls.lock().unwrap().push("connect");
            if self.hang_connect {
                std::future::pending::<()>().await;
            }
            if self.fail_connect {
                let err = Error::cache("connection refused");
                self.listeners.emit_error(&err);
                return Err(err);
            }
            self.listeners.emit_connect();
            Ok(())
        }
    }

    fn counting_options(connects: &Arc<AtomicUsize>, errors: &Arc<AtomicUsize>) -> StoreConnectionOptions {
        let c = connects.clone();
        let e = errors.clone();
        StoreConnectionOptions::new("cache.internal", 6379)
            .on_connect(move || {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .on_error(move |_| {
                e.fetch_add(1, Ordering::SeqCst);
            })
    }

    fn factory_for(client: RecordingClient) -> impl CacheClientFactory + 'static {
        move |_host: &str, _port: u16| -> Result<Arc<dyn CacheClient>> { Ok(Arc::new(client.clone())) }
    }

    #[test]
    fn test_missing_options_is_invalid_argument() {
        let err = StoreConnector::in_memory(None).unwrap_err();
        assert_eq!(err, StoreError::InvalidArgument);
    }

    #[test]
    fn test_validation_runs_before_any_client_exists() {
        let created = Arc::new(AtomicUsize::new(0));
        let counter = created.clone();
        let factory = move |_host: &str, _port: u16| -> Result<Arc<dyn CacheClient>> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(RecordingClient::default()))
        };

        let err = StoreConnector::new(Some(StoreConnectionOptions::new("", 6379)), factory).unwrap_err();
        assert_eq!(err, StoreError::MissingOption("host"));
        assert_eq!(created.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_listeners_registered_before_connect() {
        let client = RecordingClient::default();
        let connects = Arc::new(AtomicUsize::new(0));
        let errors = Arc::new(AtomicUsize::new(0));
        let connector =
            StoreConnector::new(Some(counting_options(&connects, &errors)), factory_for(client.clone())).unwrap();

        let store = connector.connect(&SessionCapability::default()).await.unwrap();

        assert_eq!(*client.calls.lock().unwrap(), vec!["on:error", "on:connect", "connect"]);
        assert_eq!(connects.load(Ordering::SeqCst), 1);
        assert_eq!(errors.load(Ordering::SeqCst), 0);
        assert_eq!(store.key_prefix(), "sess:");
    }

    #[tokio::test]
    async fn test_in_memory_client_skips_connect() {
        let connects = Arc::new(AtomicUsize::new(0));
        let errors = Arc::new(AtomicUsize::new(0));
        let connector = StoreConnector::in_memory(Some(counting_options(&connects, &errors))).unwrap();

        let store = connector
            .connect(&SessionCapability::new("app:sess:"))
            .await
            .unwrap();

        assert_eq!(connects.load(Ordering::SeqCst), 0);
        assert_eq!(store.key_prefix(), "app:sess:");
        assert!(store.client().is_healthy());
    }

    #[tokio::test]
    async fn test_connect_failure_still_yields_store() {
        let client = RecordingClient {
            fail_connect: true,
            ..Default::default()
        };
        let connects = Arc::new(AtomicUsize::new(0));
        let errors = Arc::new(AtomicUsize::new(0));
        let connector =
            StoreConnector::new(Some(counting_options(&connects, &errors)), factory_for(client)).unwrap();

        let result = connector.connect(&SessionCapability::default()).await;

        assert!(result.is_ok());
        assert_eq!(errors.load(Ordering::SeqCst), 1);
        assert_eq!(connects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_hung_connect_times_out_to_on_error() {
        let client = RecordingClient {
            hang_connect: true,
            ..Default::default()
        };
        let connects = Arc::new(AtomicUsize::new(0));
        let errors = Arc::new(AtomicUsize::new(0));
        let options = counting_options(&connects, &errors).connect_timeout(Duration::from_millis(20));
        let connector = StoreConnector::new(Some(options), factory_for(client)).unwrap();

        let result = connector.connect(&SessionCapability::default()).await;

        assert!(result.is_ok());
        assert_eq!(errors.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_client_construction_failure_is_returned() {
        let factory = |_host: &str, _port: u16| -> Result<Arc<dyn CacheClient>> {
            Err(Error::cache("unsupported address"))
        };
        let options = StoreConnectionOptions::new("localhost", 6379)
            .on_connect(|| {})
            .on_error(|_| {});
        let connector = StoreConnector::new(Some(options), factory).unwrap();

        let err = connector.connect(&SessionCapability::default()).await.unwrap_err();
        assert!(matches!(err, StoreError::Client(msg) if msg.contains("unsupported address")));
    }
}
