//! Session manager and storage backends for cookie-bound sessions.
//!
//! Provides:
//! - `SessionManager` - Issue, resume, and destroy sessions via cookies
//! - `GcTask` - Cancellable background eviction
//! - Storage implementations (memory, remote hash store, Redis)

pub mod config;
pub mod gc;
pub mod manager;
pub mod storage;

#[cfg(feature = "memory")]
use std::sync::Arc;

#[cfg(feature = "memory")]
use cookie_sessions_core::{ProviderRegistry, RegistryError};

pub use config::{BackendConfig, ConfigError, ManagerConfig};
pub use gc::GcTask;
pub use manager::{ManagerError, SessionManager};

/// Registry with the in-memory backend registered as `"memory"`.
///
/// # Errors
/// Never fails for a fresh registry; the result mirrors
/// [`ProviderRegistry::register`].
#[cfg(feature = "memory")]
pub fn default_registry() -> Result<ProviderRegistry, RegistryError> {
    ProviderRegistry::new().with_provider(
        config::MEMORY_PROVIDER,
        Arc::new(storage::MemoryStorage::new()),
    )
}
