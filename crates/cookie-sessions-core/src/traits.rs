//! Core traits for session handles and storage backends.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use thiserror::Error;

use crate::SessionId;

/// Storage error.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Session already exists: {0}")]
    AlreadyExists(SessionId),
    #[error("Session {} was destroyed or expired", .0.short())]
    Expired(SessionId),
    #[error("Remote store error: {0}")]
    Remote(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Storage error: {0}")]
    Internal(String),
}

/// A live session's key/value bag.
///
/// Every bag access refreshes the session's last access time and moves it
/// to the front of its backend's recency order. Once the session has been
/// destroyed or reaped, bag access through an old handle fails with
/// [`StorageError::Expired`], even if the same id has been re-created.
#[async_trait]
pub trait Session: Send + Sync {
    /// The identifier this session is bound to.
    fn id(&self) -> &SessionId;

    /// Get a value by key.
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;

    /// Set a value, replacing any previous value under `key`.
    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError>;

    /// Delete a value. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// Shared handle to a live session.
pub type SessionHandle = Arc<dyn Session>;

/// Typed access on top of the JSON bag.
#[async_trait]
pub trait SessionExt: Session {
    /// Get a value and deserialize it into `T`.
    ///
    /// # Errors
    /// Returns error if the backend fails or the stored value has another shape.
    async fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        match self.get(key).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Serialize `value` and store it under `key`.
    ///
    /// # Errors
    /// Returns error if serialization or the backend fails.
    async fn set_as<T: Serialize + Sync>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let value = serde_json::to_value(value)?;
        self.set(key, value).await
    }
}

impl<S: Session + ?Sized> SessionExt for S {}

/// Trait for session storage backends.
#[async_trait]
pub trait SessionStorage: Send + Sync {
    /// Create an empty session under `sid`.
    ///
    /// Fails with [`StorageError::AlreadyExists`] if `sid` is live.
    async fn init(&self, sid: &SessionId) -> Result<SessionHandle, StorageError>;

    /// Return the live session for `sid`, creating an empty one on a miss.
    async fn read(&self, sid: &SessionId) -> Result<SessionHandle, StorageError>;

    /// Remove the session for `sid`. No-op if absent.
    async fn destroy(&self, sid: &SessionId) -> Result<(), StorageError>;

    /// Remove every session idle for longer than `max_lifetime`.
    ///
    /// Returns the number of sessions reaped.
    async fn gc(&self, max_lifetime: Duration) -> Result<usize, StorageError>;
}
