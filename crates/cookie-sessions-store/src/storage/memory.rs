//! In-memory session storage.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, RwLock, Weak},
    time::Duration,
};

use async_trait::async_trait;
use cookie_sessions_core::{Session, SessionHandle, SessionId, SessionStorage, StorageError};
use serde_json::Value;
use tokio::time::Instant;

use super::index::{SessionIndex, lock};

type SharedIndex = Arc<Mutex<SessionIndex<Arc<MemorySession>>>>;

/// In-memory storage implementation.
///
/// Useful for development and single-process deployments.
/// Data is lost on restart.
pub struct MemoryStorage {
    index: SharedIndex,
}

impl MemoryStorage {
    /// Create a new in-memory storage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            index: Arc::new(Mutex::new(SessionIndex::new())),
        }
    }

    /// Number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.index).map_or(0, |index| index.len())
    }

    /// Whether no session is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live session ids, most recently accessed first.
    #[must_use]
    pub fn ids_by_recency(&self) -> Vec<SessionId> {
        lock(&self.index).map_or_else(|_| Vec::new(), |index| index.ids_by_recency())
    }

    /// Last access time of `sid`, if live.
    #[must_use]
    pub fn last_access(&self, sid: &SessionId) -> Option<Instant> {
        lock(&self.index).ok()?.last_access(sid)
    }

    fn create(
        &self,
        index: &mut SessionIndex<Arc<MemorySession>>,
        sid: &SessionId,
    ) -> Result<Arc<MemorySession>, StorageError> {
        let session = index.insert_with(sid, |generation| {
            Arc::new(MemorySession {
                id: sid.clone(),
                generation,
                values: RwLock::new(HashMap::new()),
                index: Arc::downgrade(&self.index),
            })
        })?;
        tracing::debug!(sid = sid.short(), "Created in-memory session");
        Ok(session)
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStorage for MemoryStorage {
    async fn init(&self, sid: &SessionId) -> Result<SessionHandle, StorageError> {
        let mut index = lock(&self.index)?;
        let session = self.create(&mut index, sid)?;
        Ok(session)
    }

    async fn read(&self, sid: &SessionId) -> Result<SessionHandle, StorageError> {
        let mut index = lock(&self.index)?;
        if let Some(session) = index.get_and_touch(sid) {
            return Ok(session);
        }
        let session = self.create(&mut index, sid)?;
        Ok(session)
    }

    async fn destroy(&self, sid: &SessionId) -> Result<(), StorageError> {
        let removed = lock(&self.index)?.remove(sid);
        if removed.is_some() {
            tracing::debug!(sid = sid.short(), "Destroyed in-memory session");
        }
        Ok(())
    }

    async fn gc(&self, max_lifetime: Duration) -> Result<usize, StorageError> {
        let now = Instant::now();
        let reaped = lock(&self.index)?.sweep(max_lifetime, now);
        if !reaped.is_empty() {
            tracing::debug!(reaped = reaped.len(), "Reaped idle in-memory sessions");
        }
        Ok(reaped.len())
    }
}

/// Session whose bag lives in process memory.
pub struct MemorySession {
    id: SessionId,
    generation: u64,
    values: RwLock<HashMap<String, Value>>,
    index: Weak<Mutex<SessionIndex<Arc<Self>>>>,
}

impl MemorySession {
    /// Refresh recency, failing if this incarnation is no longer live.
    fn touch(&self) -> Result<(), StorageError> {
        let live = match self.index.upgrade() {
            Some(index) => lock(&index)?.touch(&self.id, self.generation),
            None => false,
        };
        if live {
            Ok(())
        } else {
            Err(StorageError::Expired(self.id.clone()))
        }
    }
}

#[async_trait]
impl Session for MemorySession {
    fn id(&self) -> &SessionId {
        &self.id
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        self.touch()?;
        let value = self
            .values
            .read()
            .map_err(|e| StorageError::Internal(e.to_string()))?
            .get(key)
            .cloned();
        Ok(value)
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        self.touch()?;
        self.values
            .write()
            .map_err(|e| StorageError::Internal(e.to_string()))?
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.touch()?;
        self.values
            .write()
            .map_err(|e| StorageError::Internal(e.to_string()))?
            .remove(key);
        Ok(())
    }
}
