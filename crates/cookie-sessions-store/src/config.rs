//! Session manager and backend configuration.

use std::{sync::Arc, time::Duration};

use cookie_sessions_core::{SessionStorage, StorageError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name the in-memory backend is registered under by default.
pub const MEMORY_PROVIDER: &str = "memory";

/// Default session cookie name.
pub const DEFAULT_COOKIE_NAME: &str = "SESSIONID";

/// Default maximum idle lifetime (one hour).
pub const DEFAULT_MAX_LIFETIME_SECS: u64 = 3600;

/// Configuration error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Provider name must not be empty")]
    EmptyProvider,
    #[error("Cookie name must not be empty")]
    EmptyCookieName,
    #[error("Cookie name contains invalid characters: {0}")]
    InvalidCookieName(String),
    #[error("Maximum session lifetime must be at least one second")]
    LifetimeTooShort,
    #[error("GC interval must be positive")]
    ZeroGcInterval,
}

/// Session manager configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Registered provider to store sessions in.
    pub provider: String,
    /// Name of the cookie carrying the session id.
    pub cookie_name: String,
    /// Idle time after which a session is reaped, and the cookie's `Max-Age`.
    pub max_lifetime_secs: u64,
    /// Time between GC sweeps. Defaults to the maximum lifetime.
    pub gc_interval_secs: Option<u64>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            provider: MEMORY_PROVIDER.to_string(),
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            max_lifetime_secs: DEFAULT_MAX_LIFETIME_SECS,
            gc_interval_secs: None,
        }
    }
}

impl ManagerConfig {
    /// Set the provider name.
    #[must_use]
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    /// Set the cookie name.
    #[must_use]
    pub fn with_cookie_name(mut self, cookie_name: impl Into<String>) -> Self {
        self.cookie_name = cookie_name.into();
        self
    }

    /// Set the maximum idle lifetime.
    #[must_use]
    pub fn with_max_lifetime(mut self, max_lifetime: Duration) -> Self {
        self.max_lifetime_secs = max_lifetime.as_secs();
        self
    }

    /// Set the GC interval.
    #[must_use]
    pub fn with_gc_interval(mut self, interval: Duration) -> Self {
        self.gc_interval_secs = Some(interval.as_secs());
        self
    }

    /// Maximum idle lifetime.
    #[must_use]
    pub const fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_lifetime_secs)
    }

    /// Time between GC sweeps.
    #[must_use]
    pub fn gc_interval(&self) -> Duration {
        Duration::from_secs(self.gc_interval_secs.unwrap_or(self.max_lifetime_secs))
    }

    /// Check the configuration for values the manager cannot run with.
    ///
    /// # Errors
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.is_empty() {
            return Err(ConfigError::EmptyProvider);
        }
        validate_cookie_name(&self.cookie_name)?;
        if self.max_lifetime_secs == 0 {
            return Err(ConfigError::LifetimeTooShort);
        }
        if self.gc_interval_secs == Some(0) {
            return Err(ConfigError::ZeroGcInterval);
        }
        Ok(())
    }
}

/// RFC 6265 token separators.
const COOKIE_NAME_SEPARATORS: &str = "()<>@,;:\\\"/[]?={}";

/// Reject cookie names that cannot appear in a `Set-Cookie` header.
pub(crate) fn validate_cookie_name(name: &str) -> Result<(), ConfigError> {
    if name.is_empty() {
        return Err(ConfigError::EmptyCookieName);
    }
    let invalid = name.chars().any(|c| {
        c.is_ascii_control()
            || c.is_whitespace()
            || !c.is_ascii()
            || COOKIE_NAME_SEPARATORS.contains(c)
    });
    if invalid {
        return Err(ConfigError::InvalidCookieName(name.to_string()));
    }
    Ok(())
}

fn default_namespace() -> String {
    crate::storage::remote::DEFAULT_NAMESPACE.to_string()
}

/// Storage backend selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    /// In-process memory store.
    #[default]
    Memory,
    /// Bags in Redis hashes, bookkeeping in process.
    Redis {
        url: String,
        #[serde(default = "default_namespace")]
        namespace: String,
    },
}

impl BackendConfig {
    /// Construct the configured backend.
    ///
    /// # Errors
    /// Returns error if the backend was not compiled in or cannot connect.
    pub async fn build(&self) -> Result<Arc<dyn SessionStorage>, StorageError> {
        match self {
            #[cfg(feature = "memory")]
            Self::Memory => Ok(Arc::new(crate::storage::MemoryStorage::new())),
            #[cfg(not(feature = "memory"))]
            Self::Memory => Err(StorageError::Internal(
                "memory backend not enabled (feature `memory`)".to_string(),
            )),
            #[cfg(feature = "redis")]
            Self::Redis { url, namespace } => {
                let backend = crate::storage::RedisHashBackend::connect(url).await?;
                Ok(Arc::new(crate::storage::RemoteStorage::with_namespace(
                    backend,
                    namespace.clone(),
                )))
            }
            #[cfg(not(feature = "redis"))]
            Self::Redis { .. } => Err(StorageError::Internal(
                "redis backend not enabled (feature `redis`)".to_string(),
            )),
        }
    }
}
