//! Remote-backed session storage.
//!
//! Bag contents live in an external hash-field key-value service, one hash
//! per session keyed `{namespace}:{sid}`. Recency and expiry bookkeeping
//! stays local and is the same as [`MemoryStorage`](super::MemoryStorage).
//!
//! Each session's write lock is held across its liveness check and the
//! remote write, and destroy and GC take the same lock before deleting the
//! hash. A handle that outlives its session therefore can never write into
//! a re-created session's hash or leave an uncollected one behind.

use std::{
    sync::{Arc, Mutex, Weak},
    time::Duration,
};

use async_trait::async_trait;
use cookie_sessions_core::{Session, SessionHandle, SessionId, SessionStorage, StorageError};
use serde_json::Value;
use tokio::time::Instant;

use super::index::{SessionIndex, lock};

/// Default key namespace for remote session hashes.
pub const DEFAULT_NAMESPACE: &str = "session";

/// Hash-field primitives of an external key-value service.
#[async_trait]
pub trait HashBackend: Send + Sync + 'static {
    /// Set `field` of hash `key`.
    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), StorageError>;

    /// Get `field` of hash `key`.
    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StorageError>;

    /// Delete `field` of hash `key`.
    async fn hdel(&self, key: &str, field: &str) -> Result<(), StorageError>;

    /// Delete the whole hash `key`.
    async fn del(&self, key: &str) -> Result<(), StorageError>;
}

type SharedIndex<B> = Arc<Mutex<SessionIndex<Arc<RemoteSession<B>>>>>;

/// Storage whose bags live in a [`HashBackend`].
pub struct RemoteStorage<B: HashBackend> {
    backend: Arc<B>,
    namespace: String,
    index: SharedIndex<B>,
}

impl<B: HashBackend> RemoteStorage<B> {
    /// Create a remote storage using the default namespace.
    #[must_use]
    pub fn new(backend: B) -> Self {
        Self::with_namespace(backend, DEFAULT_NAMESPACE)
    }

    /// Create a remote storage with a custom key namespace.
    #[must_use]
    pub fn with_namespace(backend: B, namespace: impl Into<String>) -> Self {
        Self {
            backend: Arc::new(backend),
            namespace: namespace.into(),
            index: Arc::new(Mutex::new(SessionIndex::new())),
        }
    }

    /// The backend bags are stored in.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
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

    fn hash_key(&self, sid: &SessionId) -> String {
        format!("{}:{}", self.namespace, sid)
    }

    /// Register a fresh session locally and clear any stale remote hash.
    ///
    /// The new session's write lock is held until the remote hash is gone,
    /// so no bag operation can interleave with the clear. If the clear
    /// fails, the session is unregistered before the lock is released.
    async fn create(
        &self,
        sid: &SessionId,
        existing: bool,
    ) -> Result<Arc<RemoteSession<B>>, StorageError> {
        let (session, guard) = {
            let mut index = lock(&self.index)?;
            if existing {
                if let Some(session) = index.get_and_touch(sid) {
                    return Ok(session);
                }
            }
            let session = index.insert_with(sid, |generation| {
                Arc::new(RemoteSession {
                    id: sid.clone(),
                    key: self.hash_key(sid),
                    generation,
                    backend: Arc::clone(&self.backend),
                    write_lock: Arc::new(tokio::sync::Mutex::new(())),
                    index: Arc::downgrade(&self.index),
                })
            })?;
            let guard = Arc::clone(&session.write_lock)
                .try_lock_owned()
                .map_err(|e| StorageError::Internal(e.to_string()))?;
            (session, guard)
        };

        if let Err(e) = self.backend.del(&session.key).await {
            lock(&self.index)?.remove_generation(sid, session.generation);
            return Err(e);
        }
        drop(guard);
        tracing::debug!(sid = sid.short(), "Created remote-backed session");
        Ok(session)
    }
}

#[async_trait]
impl<B: HashBackend> SessionStorage for RemoteStorage<B> {
    async fn init(&self, sid: &SessionId) -> Result<SessionHandle, StorageError> {
        let session = self.create(sid, false).await?;
        Ok(session)
    }

    async fn read(&self, sid: &SessionId) -> Result<SessionHandle, StorageError> {
        let session = self.create(sid, true).await?;
        Ok(session)
    }

    async fn destroy(&self, sid: &SessionId) -> Result<(), StorageError> {
        let removed = lock(&self.index)?.remove(sid);
        if let Some(session) = removed {
            let _guard = session.write_lock.lock().await;
            // A failed DEL leaves the hash behind; re-creating the id clears it.
            self.backend.del(&session.key).await?;
            tracing::debug!(sid = sid.short(), "Destroyed remote-backed session");
        }
        Ok(())
    }

    async fn gc(&self, max_lifetime: Duration) -> Result<usize, StorageError> {
        let now = Instant::now();
        let reaped = lock(&self.index)?.sweep(max_lifetime, now);
        for (sid, session) in &reaped {
            let _guard = session.write_lock.lock().await;
            if let Err(e) = self.backend.del(&session.key).await {
                tracing::warn!(
                    sid = sid.short(),
                    error = %e,
                    "Failed to delete reaped session hash"
                );
            }
        }
        if !reaped.is_empty() {
            tracing::debug!(reaped = reaped.len(), "Reaped idle remote-backed sessions");
        }
        Ok(reaped.len())
    }
}

/// Session whose bag lives in a [`HashBackend`].
pub struct RemoteSession<B: HashBackend> {
    id: SessionId,
    key: String,
    generation: u64,
    backend: Arc<B>,
    write_lock: Arc<tokio::sync::Mutex<()>>,
    index: Weak<Mutex<SessionIndex<Arc<Self>>>>,
}

impl<B: HashBackend> RemoteSession<B> {
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
impl<B: HashBackend> Session for RemoteSession<B> {
    fn id(&self) -> &SessionId {
        &self.id
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        self.touch()?;
        let raw = self.backend.hget(&self.key, key).await?;
        raw.map(|raw| serde_json::from_str(&raw))
            .transpose()
            .map_err(StorageError::from)
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        let encoded = serde_json::to_string(&value)?;
        let _guard = self.write_lock.lock().await;
        self.touch()?;
        self.backend.hset(&self.key, key, &encoded).await
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        self.touch()?;
        self.backend.hdel(&self.key, key).await
    }
}
