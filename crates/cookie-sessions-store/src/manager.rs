//! Session manager binding session ids to cookies.

use std::{sync::Arc, time::Duration};

use cookie_sessions_core::{
    CookieSink, CookieSource, IdError, ProviderRegistry, SessionCookie, SessionHandle, SessionId,
    SessionStorage, StorageError,
};
use tokio::sync::Mutex;

use crate::{
    config::{ConfigError, ManagerConfig, validate_cookie_name},
    gc::GcTask,
};

/// Session manager error.
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    #[error("Unknown session provider: {0}")]
    UnknownProvider(String),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Session id error: {0}")]
    Id(#[from] IdError),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Session manager.
///
/// Reads the session cookie of each request, resolves it to a live session
/// through the selected provider, and issues a fresh id and cookie when the
/// client has none. Dispatch to the provider is serialized by a
/// manager-wide lock.
pub struct SessionManager {
    provider: Arc<dyn SessionStorage>,
    provider_name: String,
    cookie_name: String,
    max_lifetime: Duration,
    gc_interval: Duration,
    lock: Mutex<()>,
}

impl SessionManager {
    /// Create a manager using the provider registered as `provider_name`.
    ///
    /// # Errors
    /// Returns [`ManagerError::UnknownProvider`] if the name is not
    /// registered, or a configuration error for an unusable cookie name or
    /// a lifetime under one second.
    pub fn new(
        registry: &ProviderRegistry,
        provider_name: &str,
        cookie_name: impl Into<String>,
        max_lifetime: Duration,
    ) -> Result<Self, ManagerError> {
        let provider = registry
            .get(provider_name)
            .ok_or_else(|| ManagerError::UnknownProvider(provider_name.to_string()))?;
        let cookie_name = cookie_name.into();
        validate_cookie_name(&cookie_name)?;
        // Cookie Max-Age has whole-second resolution.
        if max_lifetime.as_secs() == 0 {
            return Err(ConfigError::LifetimeTooShort.into());
        }

        Ok(Self {
            provider,
            provider_name: provider_name.to_string(),
            cookie_name,
            max_lifetime,
            gc_interval: max_lifetime,
            lock: Mutex::new(()),
        })
    }

    /// Create a manager from configuration.
    ///
    /// # Errors
    /// Returns error if the configuration is invalid or names an unknown
    /// provider.
    pub fn from_config(
        registry: &ProviderRegistry,
        config: &ManagerConfig,
    ) -> Result<Self, ManagerError> {
        config.validate()?;
        let mut manager = Self::new(
            registry,
            &config.provider,
            config.cookie_name.clone(),
            config.max_lifetime(),
        )?;
        manager.gc_interval = config.gc_interval();
        Ok(manager)
    }

    /// Name of the session cookie.
    #[must_use]
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Name of the provider sessions are stored in.
    #[must_use]
    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    /// Maximum idle lifetime of a session.
    #[must_use]
    pub const fn max_lifetime(&self) -> Duration {
        self.max_lifetime
    }

    /// Time between background GC sweeps.
    #[must_use]
    pub const fn gc_interval(&self) -> Duration {
        self.gc_interval
    }

    /// The storage backend.
    #[must_use]
    pub fn provider(&self) -> &Arc<dyn SessionStorage> {
        &self.provider
    }

    /// Resolve the request's session, creating one if it has none.
    ///
    /// A missing, empty, or undecodable cookie means "no session": a fresh id
    /// is generated, stored, and sent back as a cookie through `response`.
    ///
    /// # Errors
    /// Returns error if id generation or the provider fails.
    pub async fn start<C, K>(
        &self,
        request: &C,
        response: &mut K,
    ) -> Result<SessionHandle, ManagerError>
    where
        C: CookieSource + ?Sized,
        K: CookieSink + ?Sized,
    {
        let _guard = self.lock.lock().await;

        let existing = request
            .cookie(&self.cookie_name)
            .and_then(|raw| SessionId::from_cookie_value(&raw));

        if let Some(sid) = existing {
            let session = self.provider.read(&sid).await?;
            tracing::debug!(sid = sid.short(), "Resumed session");
            return Ok(session);
        }

        let sid = SessionId::generate()?;
        let session = self.provider.init(&sid).await?;
        response.set_cookie(SessionCookie::issue(
            &self.cookie_name,
            &sid,
            self.max_lifetime,
        ));
        tracing::debug!(sid = sid.short(), provider = %self.provider_name, "Issued new session");
        Ok(session)
    }

    /// Destroy the request's session and expire its cookie.
    ///
    /// No-op if the request carries no session cookie.
    ///
    /// # Errors
    /// Returns error if the provider fails.
    pub async fn destroy<C, K>(&self, request: &C, response: &mut K) -> Result<(), ManagerError>
    where
        C: CookieSource + ?Sized,
        K: CookieSink + ?Sized,
    {
        let Some(raw) = request
            .cookie(&self.cookie_name)
            .filter(|raw| !raw.is_empty())
        else {
            return Ok(());
        };

        let _guard = self.lock.lock().await;
        if let Some(sid) = SessionId::from_cookie_value(&raw) {
            self.provider.destroy(&sid).await?;
            tracing::debug!(sid = sid.short(), "Destroyed session");
        }
        response.set_cookie(SessionCookie::expire(&self.cookie_name));
        Ok(())
    }

    /// Run one GC sweep, returning the number of sessions reaped.
    ///
    /// # Errors
    /// Returns error if the provider fails.
    pub async fn gc(&self) -> Result<usize, ManagerError> {
        let _guard = self.lock.lock().await;
        let reaped = self.provider.gc(self.max_lifetime).await?;
        if reaped > 0 {
            tracing::info!(reaped, provider = %self.provider_name, "Session GC sweep");
        }
        Ok(reaped)
    }

    /// Run [`gc`](Self::gc) in the background every [`gc_interval`](Self::gc_interval).
    ///
    /// The first sweep runs immediately. Must be called within a Tokio runtime.
    #[must_use = "dropping the handle stops the GC task"]
    pub fn spawn_gc(self: &Arc<Self>) -> GcTask {
        GcTask::spawn(Arc::clone(self), self.gc_interval)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};

    use cookie_sessions_core::SessionExt;
    use serde_json::json;

    use super::*;
    use crate::storage::{MemoryStorage, RemoteStorage, remote::tests::FakeHashes};

    const COOKIE: &str = "GOSESSID";

    fn registry_with(storage: Arc<dyn SessionStorage>) -> ProviderRegistry {
        ProviderRegistry::new().with_provider("memory", storage).unwrap()
    }

    fn manager(lifetime: Duration) -> (SessionManager, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        let registry = registry_with(storage.clone());
        let manager = SessionManager::new(&registry, "memory", COOKIE, lifetime).unwrap();
        (manager, storage)
    }

    fn no_cookies() -> HashMap<String, String> {
        HashMap::new()
    }

    fn request_with(cookie: &SessionCookie) -> HashMap<String, String> {
        HashMap::from([(cookie.name.clone(), cookie.value.clone())])
    }

    #[test]
    fn test_unknown_provider() {
        let registry = ProviderRegistry::new();
        let err = SessionManager::new(&registry, "memory", COOKIE, Duration::from_secs(60))
            .err()
            .unwrap();
        assert!(matches!(err, ManagerError::UnknownProvider(name) if name == "memory"));
    }

    #[test]
    fn test_rejects_unusable_settings() {
        let registry = registry_with(Arc::new(MemoryStorage::new()));
        let err = SessionManager::new(&registry, "memory", "bad;name", Duration::from_secs(60))
            .err()
            .unwrap();
        assert!(matches!(err, ManagerError::Config(ConfigError::InvalidCookieName(_))));

        for lifetime in [Duration::ZERO, Duration::from_millis(500)] {
            let err = SessionManager::new(&registry, "memory", COOKIE, lifetime)
                .err()
                .unwrap();
            assert!(matches!(err, ManagerError::Config(ConfigError::LifetimeTooShort)));
        }
        assert!(SessionManager::new(&registry, "memory", COOKIE, Duration::from_secs(1)).is_ok());
    }

    #[test]
    fn test_from_config() {
        let registry = registry_with(Arc::new(MemoryStorage::new()));
        let config = ManagerConfig::default()
            .with_cookie_name(COOKIE)
            .with_max_lifetime(Duration::from_secs(120))
            .with_gc_interval(Duration::from_secs(30));
        let manager = SessionManager::from_config(&registry, &config).unwrap();
        assert_eq!(manager.cookie_name(), COOKIE);
        assert_eq!(manager.provider_name(), "memory");
        assert_eq!(manager.max_lifetime(), Duration::from_secs(120));
        assert_eq!(manager.gc_interval(), Duration::from_secs(30));

        let err = SessionManager::from_config(&registry, &config.with_provider("redis"))
            .err()
            .unwrap();
        assert!(matches!(err, ManagerError::UnknownProvider(_)));
    }

    #[tokio::test]
    async fn test_start_without_cookie_issues_session() {
        let (manager, storage) = manager(Duration::from_secs(3600));
        let mut response = Vec::<SessionCookie>::new();

        let session = manager.start(&no_cookies(), &mut response).await.unwrap();

        assert_eq!(response.len(), 1);
        let cookie = &response[0];
        assert_eq!(cookie.name, COOKIE);
        assert_eq!(cookie.path, "/");
        assert!(cookie.http_only);
        assert_eq!(cookie.max_age, Some(3600));
        assert_eq!(SessionId::from_cookie_value(&cookie.value).as_ref(), Some(session.id()));
        assert_eq!(storage.len(), 1);
    }

    #[tokio::test]
    async fn test_start_with_cookie_resumes_session() {
        let (manager, storage) = manager(Duration::from_secs(3600));
        let mut response = Vec::<SessionCookie>::new();
        let first = manager.start(&no_cookies(), &mut response).await.unwrap();
        first.set_as("username", &"ann").await.unwrap();

        let request = request_with(&response[0]);
        let mut second_response = Vec::<SessionCookie>::new();
        let second = manager.start(&request, &mut second_response).await.unwrap();

        assert!(second_response.is_empty());
        assert_eq!(second.id(), first.id());
        assert_eq!(
            second.get_as::<String>("username").await.unwrap().as_deref(),
            Some("ann")
        );
        assert_eq!(storage.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_or_malformed_cookie_issues_fresh_session() {
        let (manager, storage) = manager(Duration::from_secs(3600));
        for raw in ["", "%FF%FE"] {
            let request = HashMap::from([(COOKIE.to_string(), raw.to_string())]);
            let mut response = Vec::<SessionCookie>::new();
            manager.start(&request, &mut response).await.unwrap();
            assert_eq!(response.len(), 1);
        }
        assert_eq!(storage.len(), 2);
    }

    #[tokio::test]
    async fn test_replayed_unknown_cookie_recreates_session() {
        let (manager, storage) = manager(Duration::from_secs(3600));
        let request = HashMap::from([(COOKIE.to_string(), "from-elsewhere".to_string())]);
        let mut response = Vec::<SessionCookie>::new();

        let session = manager.start(&request, &mut response).await.unwrap();

        assert!(response.is_empty());
        assert_eq!(session.id().as_str(), "from-elsewhere");
        assert_eq!(session.get("k").await.unwrap(), None);
        assert_eq!(storage.len(), 1);
    }

    #[tokio::test]
    async fn test_issued_ids_are_unique() {
        let (manager, storage) = manager(Duration::from_secs(3600));
        let mut ids = HashSet::new();
        for _ in 0..200 {
            let session = manager
                .start(&no_cookies(), &mut Vec::<SessionCookie>::new())
                .await
                .unwrap();
            ids.insert(session.id().clone());
        }
        assert_eq!(ids.len(), 200);
        assert_eq!(storage.len(), 200);
    }

    #[tokio::test]
    async fn test_destroy_expires_cookie_and_forgets_bag() {
        let (manager, storage) = manager(Duration::from_secs(3600));
        let mut response = Vec::<SessionCookie>::new();
        let session = manager.start(&no_cookies(), &mut response).await.unwrap();
        session.set("k", json!("v")).await.unwrap();
        let request = request_with(&response[0]);

        let mut destroy_response = Vec::<SessionCookie>::new();
        manager.destroy(&request, &mut destroy_response).await.unwrap();

        assert_eq!(destroy_response.len(), 1);
        assert!(destroy_response[0].is_removal());
        assert_eq!(destroy_response[0].name, COOKIE);
        assert!(destroy_response[0].expires.is_some());
        assert!(storage.is_empty());

        // Replaying the old cookie yields a fresh, empty bag under the same id.
        let replayed = manager.start(&request, &mut Vec::<SessionCookie>::new()).await.unwrap();
        assert_eq!(replayed.id(), session.id());
        assert_eq!(replayed.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_destroy_without_cookie_is_noop() {
        let (manager, storage) = manager(Duration::from_secs(3600));
        manager.start(&no_cookies(), &mut Vec::<SessionCookie>::new()).await.unwrap();

        let mut response = Vec::<SessionCookie>::new();
        manager.destroy(&no_cookies(), &mut response).await.unwrap();
        assert!(response.is_empty());
        assert_eq!(storage.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gc_reaps_expired_session() {
        let (manager, storage) = manager(Duration::from_secs(1));
        let mut response = Vec::<SessionCookie>::new();
        let session = manager.start(&no_cookies(), &mut response).await.unwrap();
        session.set("k", json!("v")).await.unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(manager.gc().await.unwrap(), 1);
        assert!(storage.is_empty());

        let request = request_with(&response[0]);
        let fresh = manager.start(&request, &mut Vec::<SessionCookie>::new()).await.unwrap();
        assert_eq!(fresh.id(), session.id());
        assert_eq!(fresh.get("k").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_gc_runs_until_stopped() {
        let (manager, storage) = manager(Duration::from_secs(1));
        let manager = Arc::new(manager);
        let task = manager.spawn_gc();

        manager.start(&no_cookies(), &mut Vec::<SessionCookie>::new()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert!(storage.is_empty());

        task.stop().await;

        manager.start(&no_cookies(), &mut Vec::<SessionCookie>::new()).await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(storage.len(), 1);
    }

    #[tokio::test]
    async fn test_remote_provider_through_manager() {
        let storage: Arc<dyn SessionStorage> = Arc::new(RemoteStorage::new(FakeHashes::default()));
        let registry = ProviderRegistry::new().with_provider("remote", storage).unwrap();
        let manager =
            SessionManager::new(&registry, "remote", COOKIE, Duration::from_secs(60)).unwrap();

        let mut response = Vec::<SessionCookie>::new();
        let session = manager.start(&no_cookies(), &mut response).await.unwrap();
        session.set("k", json!([1, 2])).await.unwrap();

        let again = manager
            .start(&request_with(&response[0]), &mut Vec::<SessionCookie>::new())
            .await
            .unwrap();
        assert_eq!(again.get("k").await.unwrap(), Some(json!([1, 2])));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_starts() {
        let (manager, storage) = manager(Duration::from_secs(3600));
        let manager = Arc::new(manager);
        let mut tasks = Vec::new();
        for _ in 0..16 {
            let manager = Arc::clone(&manager);
            tasks.push(tokio::spawn(async move {
                let mut response = Vec::<SessionCookie>::new();
                let session = manager.start(&no_cookies(), &mut response).await.unwrap();
                session.set("n", json!(1)).await.unwrap();
                session.id().clone()
            }));
        }
        let mut ids = HashSet::new();
        for task in tasks {
            ids.insert(task.await.unwrap());
        }
        assert_eq!(ids.len(), 16);
        assert_eq!(storage.len(), 16);
    }
}
