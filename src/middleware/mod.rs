//! Response Memoization
//!
//! Transport-agnostic caching wrapper around an expensive request handler.
//! A transport plugs in by implementing [`CacheableResponse`] for its
//! response type and supplying a key function over its request type; the
//! [`http`] module does this for axum.

pub mod http;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::registry::CacheRegistry;

pub use http::{cache_responses, path_key, CachedHttpResponse};

/// Name of the response header carrying the [`CacheStatus`].
pub const CACHE_STATUS_HEADER: &str = "x-cache";

/// Whether a response was served from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

/// What the middleware needs from a transport's response type.
pub trait CacheableResponse: Serialize + DeserializeOwned {
    /// Only successful responses are stored.
    fn is_success(&self) -> bool;

    /// Annotates the outbound response. The stored copy never carries it.
    fn set_cache_status(&mut self, status: CacheStatus);
}

/// Maps a request to its cache key.
pub type KeyFn<Req> = Arc<dyn Fn(&Req) -> String + Send + Sync>;

/// Memoizes successful handler results in one registry namespace.
pub struct CachingMiddleware<Req> {
    registry: Arc<CacheRegistry>,
    namespace: String,
    key_fn: KeyFn<Req>,
    ttl: Option<Duration>,
}

impl<Req> CachingMiddleware<Req> {
    /// Entries use the namespace's default TTL unless [`with_ttl`](Self::with_ttl) is set.
    pub fn new<F>(registry: Arc<CacheRegistry>, namespace: impl Into<String>, key_fn: F) -> Self
    where
        F: Fn(&Req) -> String + Send + Sync + 'static,
    {
        Self {
            registry,
            namespace: namespace.into(),
            key_fn: Arc::new(key_fn),
            ttl: None,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Serves `req` from the cache, or runs `handler` and caches its result
    /// if it succeeded. On a hit the handler is never invoked.
    pub async fn handle<Resp, H, Fut>(&self, req: Req, handler: H) -> Resp
    where
        Resp: CacheableResponse,
        H: FnOnce(Req) -> Fut,
        Fut: Future<Output = Resp>,
    {
        let key = (self.key_fn)(&req);

        if let Some(mut cached) = self.registry.get::<Resp>(&self.namespace, &key) {
            debug!("cache HIT {}/{}", self.namespace, key);
            cached.set_cache_status(CacheStatus::Hit);
            return cached;
        }

        let mut response = handler(req).await;
        if response.is_success() {
            self.registry.set(&self.namespace, &key, &response, self.ttl);
            response.set_cache_status(CacheStatus::Miss);
            debug!("cache MISS {}/{}, stored", self.namespace, key);
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NamespaceConfig;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Reply {
        ok: bool,
        body: String,
        #[serde(skip)]
        status: Option<CacheStatus>,
    }

    impl CacheableResponse for Reply {
        fn is_success(&self) -> bool {
            self.ok
        }

        fn set_cache_status(&mut self, status: CacheStatus) {
            self.status = Some(status);
        }
    }

    fn middleware() -> (CachingMiddleware<u32>, Arc<CacheRegistry>) {
        let registry = Arc::new(CacheRegistry::new(vec![NamespaceConfig::new("leaderboard")]));
        let middleware = CachingMiddleware::new(Arc::clone(&registry), "leaderboard", |id: &u32| {
            format!("leaderboard:{id}")
        })
        .with_ttl(Duration::from_secs(60));
        (middleware, registry)
    }

    async fn call(middleware: &CachingMiddleware<u32>, id: u32, ok: bool, calls: &AtomicUsize) -> Reply {
        middleware
            .handle(id, |id| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Reply {
                    ok,
                    body: format!("board {id}"),
                    status: None,
                }
            })
            .await
    }

    #[tokio::test]
    async fn test_replay_served_from_cache() {
        let (middleware, registry) = middleware();
        let calls = AtomicUsize::new(0);

        let first = call(&middleware, 1, true, &calls).await;
        assert_eq!(first.status, Some(CacheStatus::Miss));

        let second = call(&middleware, 1, true, &calls).await;
        assert_eq!(second.status, Some(CacheStatus::Hit));
        assert_eq!(second.body, "board 1");

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(registry.has("leaderboard", "leaderboard:1"));
    }

    #[tokio::test]
    async fn test_distinct_keys_not_shared() {
        let (middleware, _) = middleware();
        let calls = AtomicUsize::new(0);

        call(&middleware, 1, true, &calls).await;
        let other = call(&middleware, 2, true, &calls).await;

        assert_eq!(other.status, Some(CacheStatus::Miss));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failures_not_cached() {
        let (middleware, registry) = middleware();
        let calls = AtomicUsize::new(0);

        let first = call(&middleware, 9, false, &calls).await;
        let second = call(&middleware, 9, false, &calls).await;

        assert_eq!(first.status, None);
        assert_eq!(second.status, None);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!registry.has("leaderboard", "leaderboard:9"));
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(CacheStatus::Hit.as_str(), "HIT");
        assert_eq!(CacheStatus::Miss.as_str(), "MISS");
    }
}
