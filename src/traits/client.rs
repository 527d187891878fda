//! Connection capability for cache clients used as session stores
//!
//! A session store needs more from its backend than plain key/value access:
//! it registers lifecycle listeners and, for network clients, performs an
//! explicit connect step before the store is handed to the session layer.

use super::cache::Cache;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::{Arc, RwLock};

/// Called once a client has established its connection
pub type ConnectCallback = Arc<dyn Fn() + Send + Sync>;

/// Called whenever a client reports a connection or command failure
pub type ErrorCallback = Arc<dyn Fn(&Error) + Send + Sync>;

/// A lifecycle listener registered on a [`CacheClient`]
#[derive(Clone)]
pub enum ClientListener {
    Connect(ConnectCallback),
    Error(ErrorCallback),
}

impl std::fmt::Debug for ClientListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientListener::Connect(_) => f.write_str("ClientListener::Connect"),
            ClientListener::Error(_) => f.write_str("ClientListener::Error"),
        }
    }
}

/// A cache backend that can act as a session store client
#[async_trait]
pub trait CacheClient: Cache {
    /// Register a lifecycle listener
    fn on(&self, listener: ClientListener);

    /// Whether [`connect`](Self::connect) must be awaited before use
    fn requires_connect(&self) -> bool {
        true
    }

    /// Establish the connection
    ///
    /// Failures are reported to registered error listeners as well as returned.
    async fn connect(&self) -> Result<()>;
}

/// Creates cache clients bound to a host and port
pub trait CacheClientFactory: Send + Sync {
    fn create_client(&self, host: &str, port: u16) -> Result<Arc<dyn CacheClient>>;
}

impl<F> CacheClientFactory for F
where
    F: Fn(&str, u16) -> Result<Arc<dyn CacheClient>> + Send + Sync,
{
    fn create_client(&self, host: &str, port: u16) -> Result<Arc<dyn CacheClient>> {
        self(host, port)
    }
}

/// Listener storage shared by the bundled client implementations
#[derive(Clone, Default)]
pub struct ListenerRegistry {
    listeners: Arc<RwLock<Vec<ClientListener>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, listener: ClientListener) {
        match self.listeners.write() {
            Ok(mut listeners) => listeners.push(listener),
            Err(poisoned) => poisoned.into_inner().push(listener),
        }
    }

    /// Number of registered listeners
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn emit_connect(&self) {
        for listener in self.snapshot() {
            if let ClientListener::Connect(callback) = listener {
                callback();
            }
        }
    }

    pub fn emit_error(&self, error: &Error) {
        for listener in self.snapshot() {
            if let ClientListener::Error(callback) = listener {
                callback(error);
            }
        }
    }

    // Callbacks run without the lock held so they may register further listeners
    fn snapshot(&self) -> Vec<ClientListener> {
        match self.listeners.read() {
            Ok(listeners) => listeners.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.len())
            .finish()
    }
}
