use crate::store::CacheSessionStore;
use async_trait::async_trait;
use tower_sessions::session::{Id, Record};
use tower_sessions::{MemoryStore, SessionStore, session_store};

/// Storage behind the session layer
#[derive(Debug, Clone)]
pub enum SessionBackend {
    /// Process-local store used when no connector is configured
    Memory(MemoryStore),
    /// Store opened through a [`StoreConnector`](crate::store::StoreConnector)
    Cache(CacheSessionStore),
}

impl Default for SessionBackend {
    fn default() -> Self {
        SessionBackend::Memory(MemoryStore::default())
    }
}

impl From<CacheSessionStore> for SessionBackend {
    fn from(store: CacheSessionStore) -> Self {
        SessionBackend::Cache(store)
    }
}

#[async_trait]
impl SessionStore for SessionBackend {
    async fn create(&self, record: &mut Record) -> session_store::Result<()> {
        match self {
            SessionBackend::Memory(store) => store.create(record).await,
            SessionBackend::Cache(store) => store.create(record).await,
        }
    }

    async fn save(&self, record: &Record) -> session_store::Result<()> {
        match self {
            SessionBackend::Memory(store) => store.save(record).await,
            SessionBackend::Cache(store) => store.save(record).await,
        }
    }

    async fn load(&self, session_id: &Id) -> session_store::Result<Option<Record>> {
        match self {
            SessionBackend::Memory(store) => store.load(session_id).await,
            SessionBackend::Cache(store) => store.load(session_id).await,
        }
    }

    async fn delete(&self, session_id: &Id) -> session_store::Result<()> {
        match self {
            SessionBackend::Memory(store) => store.delete(session_id).await,
            SessionBackend::Cache(store) => store.delete(session_id).await,
        }
    }
}
