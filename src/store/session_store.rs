use crate::traits::client::CacheClient;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tower_sessions::SessionStore;
use tower_sessions::session::{Id, Record};
use tower_sessions::session_store;

/// Session store over a connected [`CacheClient`]
///
/// Records are JSON encoded under `{key_prefix}{session id}` and expire in the
/// backend when the session does.
#[derive(Clone)]
pub struct CacheSessionStore {
    client: Arc<dyn CacheClient>,
    key_prefix: String,
}

impl CacheSessionStore {
    pub fn new(client: Arc<dyn CacheClient>, key_prefix: impl Into<String>) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
        }
    }

    /// The underlying client
    pub fn client(&self) -> &Arc<dyn CacheClient> {
        &self.client
    }

    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    fn key(&self, id: &Id) -> String {
        format!("{}{}", self.key_prefix, id)
    }
}

fn ttl_until(expiry_date: OffsetDateTime) -> Duration {
    let remaining = (expiry_date - OffsetDateTime::now_utc()).whole_seconds();
    Duration::from_secs(remaining.max(1) as u64)
}

fn backend_error(err: crate::error::Error) -> session_store::Error {
    session_store::Error::Backend(err.to_string())
}

#[async_trait]
impl SessionStore for CacheSessionStore {
    async fn create(&self, record: &mut Record) -> session_store::Result<()> {
        while self
            .client
            .get_bytes(&self.key(&record.id))
            .await
            .map_err(backend_error)?
            .is_some()
        {
            record.id = Id::default();
        }
        self.save(record).await
    }

    async fn save(&self, record: &Record) -> session_store::Result<()> {
        let bytes = serde_json::to_vec(record)
            .map_err(|e| session_store::Error::Encode(e.to_string()))?;

        self.client
            .set_bytes(&self.key(&record.id), bytes, Some(ttl_until(record.expiry_date)))
            .await
            .map_err(backend_error)
    }

    async fn load(&self, session_id: &Id) -> session_store::Result<Option<Record>> {
        let Some(bytes) = self
            .client
            .get_bytes(&self.key(session_id))
            .await
            .map_err(backend_error)?
        else {
            return Ok(None);
        };

        let record: Record = serde_json::from_slice(&bytes)
            .map_err(|e| session_store::Error::Decode(e.to_string()))?;

        // Backends with coarse TTLs may still hand back a record that just lapsed
        if record.expiry_date <= OffsetDateTime::now_utc() {
            return Ok(None);
        }

        Ok(Some(record))
    }

    async fn delete(&self, session_id: &Id) -> session_store::Result<()> {
        self.client
            .delete(&self.key(session_id))
            .await
            .map_err(backend_error)
    }
}

impl std::fmt::Debug for CacheSessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheSessionStore")
            .field("key_prefix", &self.key_prefix)
            .field("healthy", &self.client.is_healthy())
            .finish()
    }
}
