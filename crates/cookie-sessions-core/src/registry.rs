//! Named storage provider registry.

use std::{collections::HashMap, fmt, sync::Arc};

use thiserror::Error;

use crate::SessionStorage;

/// Registry error.
///
/// Both variants are configuration mistakes; callers should abort startup.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Provider registered twice: {0}")]
    Duplicate(String),
    #[error("Provider name must not be empty")]
    EmptyName,
}

/// Append-only mapping from provider name to storage backend.
///
/// Built once at startup and handed to the session manager.
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn SessionStorage>>,
}

impl ProviderRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `provider` under `name`.
    ///
    /// # Errors
    /// Returns error if `name` is empty or already taken.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        provider: Arc<dyn SessionStorage>,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if self.providers.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        tracing::debug!(provider = %name, "Registered session provider");
        self.providers.insert(name, provider);
        Ok(())
    }

    /// Builder-style [`register`](Self::register).
    ///
    /// # Errors
    /// Returns error if `name` is empty or already taken.
    pub fn with_provider(
        mut self,
        name: impl Into<String>,
        provider: Arc<dyn SessionStorage>,
    ) -> Result<Self, RegistryError> {
        self.register(name, provider)?;
        Ok(self)
    }

    /// Look up a provider by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn SessionStorage>> {
        self.providers.get(name).map(Arc::clone)
    }

    /// Whether `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    /// Registered provider names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .finish()
    }
}
