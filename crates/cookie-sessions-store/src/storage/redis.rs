//! Redis hash backend (feature-gated).

use ::redis::{AsyncCommands, aio::ConnectionManager};
use async_trait::async_trait;
use cookie_sessions_core::StorageError;

use super::remote::{HashBackend, RemoteStorage};

/// Remote-backed storage keeping bags in Redis hashes.
pub type RedisStorage = RemoteStorage<RedisHashBackend>;

/// [`HashBackend`] over a Redis connection manager.
#[derive(Clone)]
pub struct RedisHashBackend {
    conn: ConnectionManager,
}

impl RedisHashBackend {
    /// Connect to the Redis server at `url`.
    ///
    /// # Errors
    /// Returns error if the URL is invalid or the connection fails.
    pub async fn connect(url: &str) -> Result<Self, StorageError> {
        let client = ::redis::Client::open(url).map_err(remote)?;
        let conn = ConnectionManager::new(client).await.map_err(remote)?;
        tracing::debug!("Connected session backend to Redis");
        Ok(Self { conn })
    }

    /// Wrap an existing connection manager.
    #[must_use]
    pub const fn from_connection(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[allow(clippy::needless_pass_by_value)]
fn remote(e: ::redis::RedisError) -> StorageError {
    StorageError::Remote(e.to_string())
}

#[async_trait]
impl HashBackend for RedisHashBackend {
    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), StorageError> {
        let mut conn = self.conn.clone();
        let _: () = conn.hset(key, field, value).await.map_err(remote)?;
        Ok(())
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StorageError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.hget(key, field).await.map_err(remote)?;
        Ok(value)
    }

    async fn hdel(&self, key: &str, field: &str) -> Result<(), StorageError> {
        let mut conn = self.conn.clone();
        let _: () = conn.hdel(key, field).await.map_err(remote)?;
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), StorageError> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await.map_err(remote)?;
        Ok(())
    }
}
