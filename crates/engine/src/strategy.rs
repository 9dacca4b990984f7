//! Caching strategies executed against one cache generation.
//!
//! Each strategy takes the request, a handle to the current generation, and
//! the network fetcher, and produces the response delivered to the caller.
//! Background refreshes are detached tasks: their outcome is invisible to
//! the request that triggered them, and their failures are logged rather
//! than propagated. Store failures inside a strategy degrade to
//! network-only behavior instead of failing the request.

use crate::fetch::Fetcher;
use offcast_core::{CacheHandle, Error, Request, Response, StrategyKind};
use std::sync::Arc;
use url::Url;

/// Execute one strategy for one request.
///
/// `fallback` is the canonical navigation fallback key; only NetworkFirst
/// consults it.
pub(crate) async fn run(
    strategy: StrategyKind,
    fetcher: &Arc<dyn Fetcher>,
    cache: &CacheHandle,
    request: &Request,
    fallback: Option<&Url>,
) -> Result<Response, Error> {
    match strategy {
        StrategyKind::CacheFirst => cache_first(fetcher, cache, request).await,
        StrategyKind::NetworkFirst => network_first(fetcher, cache, request, fallback).await,
        StrategyKind::StaleWhileRevalidate => stale_while_revalidate(fetcher, cache, request).await,
    }
}

/// Serve from cache when possible, revalidating in the background.
/// On a miss, the network result is awaited, cached, and returned.
async fn cache_first(
    fetcher: &Arc<dyn Fetcher>,
    cache: &CacheHandle,
    request: &Request,
) -> Result<Response, Error> {
    match cache.lookup(request).await {
        Ok(Some(hit)) => {
            revalidate(fetcher.clone(), cache.clone(), request.clone());
            return Ok(hit);
        }
        Ok(None) => {}
        Err(e) => tracing::warn!("cache lookup for {} failed, going network-only: {}", request.url, e),
    }

    let response = fetcher.fetch(request).await?;
    store(cache, request, &response).await;
    Ok(response)
}

/// Try the network first; fall back to the cached entry, then to the
/// fallback key, then surface the original network failure.
async fn network_first(
    fetcher: &Arc<dyn Fetcher>,
    cache: &CacheHandle,
    request: &Request,
    fallback: Option<&Url>,
) -> Result<Response, Error> {
    let failure = match fetcher.fetch(request).await {
        Ok(response) => {
            store(cache, request, &response).await;
            return Ok(response);
        }
        Err(e) => e,
    };

    match cache.lookup(request).await {
        Ok(Some(hit)) => return Ok(hit),
        Ok(None) => {}
        Err(e) => tracing::warn!("fallback lookup for {} failed: {}", request.url, e),
    }

    if let Some(key) = fallback {
        match cache.lookup_url(key).await {
            Ok(Some(hit)) => {
                tracing::debug!("serving fallback {} for {}", key, request.url);
                return Ok(hit);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("fallback key lookup failed: {}", e),
        }
    }

    Err(failure)
}

/// Return the cached entry immediately while a concurrent fetch refreshes
/// it. The refresh is only awaited when there is no cached entry.
async fn stale_while_revalidate(
    fetcher: &Arc<dyn Fetcher>,
    cache: &CacheHandle,
    request: &Request,
) -> Result<Response, Error> {
    let refresh = {
        let fetcher = fetcher.clone();
        let cache = cache.clone();
        let request = request.clone();
        tokio::spawn(async move {
            match fetcher.fetch(&request).await {
                Ok(response) => {
                    store(&cache, &request, &response).await;
                    Ok(response)
                }
                Err(e) => {
                    tracing::debug!("background refresh of {} failed: {}", request.url, e);
                    Err(e)
                }
            }
        })
    };

    match cache.lookup(request).await {
        // The refresh task keeps running detached; its update is not
        // observable by this request.
        Ok(Some(hit)) => return Ok(hit),
        Ok(None) => {}
        Err(e) => tracing::warn!("cache lookup for {} failed, waiting on network: {}", request.url, e),
    }

    refresh
        .await
        .map_err(|e| Error::NetworkFailure(format!("refresh task failed: {}", e)))?
}

/// Refresh an entry in the background. Failures never reach the response path.
fn revalidate(fetcher: Arc<dyn Fetcher>, cache: CacheHandle, request: Request) {
    tokio::spawn(async move {
        match fetcher.fetch(&request).await {
            Ok(response) => store(&cache, &request, &response).await,
            Err(e) => tracing::debug!("background revalidation of {} failed: {}", request.url, e),
        }
    });
}

/// Best-effort write-through. A store failure is logged, never surfaced.
async fn store(cache: &CacheHandle, request: &Request, response: &Response) {
    match cache.put(request, response).await {
        Ok(true) => {}
        Ok(false) => tracing::debug!("skipping non-cacheable response for {}", request.url),
        Err(e) => tracing::warn!("failed to cache {}: {}", request.url, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::MockFetcher;
    use offcast_core::{CacheDb, VersionedStore};
    use std::time::Duration;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    async fn cache() -> CacheHandle {
        let db = CacheDb::open_in_memory().await.unwrap();
        VersionedStore::new(db, false).open("static-v1").await.unwrap()
    }

    fn fetcher() -> (Arc<MockFetcher>, Arc<dyn Fetcher>) {
        let mock = Arc::new(MockFetcher::new());
        let dynamic: Arc<dyn Fetcher> = mock.clone();
        (mock, dynamic)
    }

    /// Poll until the cached body for `request` matches `body`, or give up.
    async fn eventually_cached(cache: &CacheHandle, request: &Request, body: &[u8]) -> bool {
        for _ in 0..100 {
            if let Some(hit) = cache.lookup(request).await.unwrap()
                && hit.body.as_ref() == body
            {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    #[tokio::test]
    async fn test_cache_first_hit_returns_cached_and_revalidates() {
        let (mock, dynamic) = fetcher();
        let cache = cache().await;
        let request = Request::get(url("https://app.example/api/items"));

        cache.put(&request, &Response::new(200, "stale")).await.unwrap();
        mock.respond("https://app.example/api/items", Response::new(200, "fresh"));

        let response = run(StrategyKind::CacheFirst, &dynamic, &cache, &request, None).await.unwrap();
        assert_eq!(response.body.as_ref(), b"stale");

        assert!(eventually_cached(&cache, &request, b"fresh").await);
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_cache_first_miss_fetches_and_caches() {
        let (mock, dynamic) = fetcher();
        let cache = cache().await;
        let request = Request::get(url("https://app.example/api/items"));

        mock.respond("https://app.example/api/items", Response::new(200, "fresh"));

        let response = run(StrategyKind::CacheFirst, &dynamic, &cache, &request, None).await.unwrap();
        assert_eq!(response.body.as_ref(), b"fresh");
        assert_eq!(cache.lookup(&request).await.unwrap().unwrap().body.as_ref(), b"fresh");
    }

    #[tokio::test]
    async fn test_cache_first_miss_network_failure_propagates() {
        let (_mock, dynamic) = fetcher();
        let cache = cache().await;
        let request = Request::get(url("https://app.example/api/items"));

        let result = run(StrategyKind::CacheFirst, &dynamic, &cache, &request, None).await;
        assert!(matches!(result, Err(Error::NetworkFailure(_))));
        assert!(cache.lookup(&request).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_network_first_success_caches_and_returns() {
        let (mock, dynamic) = fetcher();
        let cache = cache().await;
        let request = Request::get(url("https://app.example/"));

        mock.respond("https://app.example/", Response::new(200, "live"));

        let response = run(StrategyKind::NetworkFirst, &dynamic, &cache, &request, None).await.unwrap();
        assert_eq!(response.body.as_ref(), b"live");
        assert_eq!(cache.lookup(&request).await.unwrap().unwrap().body.as_ref(), b"live");
    }

    #[tokio::test]
    async fn test_network_first_failure_falls_back_to_cached() {
        let (_mock, dynamic) = fetcher();
        let cache = cache().await;
        let request = Request::get(url("https://app.example/"));

        cache.put(&request, &Response::new(200, "offline copy")).await.unwrap();

        let response = run(StrategyKind::NetworkFirst, &dynamic, &cache, &request, None).await.unwrap();
        assert_eq!(response.body.as_ref(), b"offline copy");
    }

    #[tokio::test]
    async fn test_network_first_failure_uses_fallback_key() {
        let (_mock, dynamic) = fetcher();
        let cache = cache().await;
        let fallback = url("https://app.example/index.html");

        cache
            .put(&Request::get(fallback.clone()), &Response::new(200, "app shell"))
            .await
            .unwrap();

        // Request for a deep link with no cached entry of its own.
        let request = Request::get(url("https://app.example/settings/profile"));
        let response = run(StrategyKind::NetworkFirst, &dynamic, &cache, &request, Some(&fallback))
            .await
            .unwrap();
        assert_eq!(response.body.as_ref(), b"app shell");
    }

    #[tokio::test]
    async fn test_network_first_failure_without_fallback_surfaces_error() {
        let (_mock, dynamic) = fetcher();
        let cache = cache().await;
        let request = Request::get(url("https://app.example/"));

        let result = run(StrategyKind::NetworkFirst, &dynamic, &cache, &request, None).await;
        assert!(matches!(result, Err(Error::NetworkFailure(_))));
    }

    #[tokio::test]
    async fn test_network_first_does_not_cache_non_200() {
        let (mock, dynamic) = fetcher();
        let cache = cache().await;
        let request = Request::get(url("https://app.example/gone"));

        mock.respond("https://app.example/gone", Response::new(404, "nope"));

        let response = run(StrategyKind::NetworkFirst, &dynamic, &cache, &request, None).await.unwrap();
        assert_eq!(response.status, 404);
        assert!(cache.lookup(&request).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_swr_returns_stale_then_updates_cache() {
        let (mock, dynamic) = fetcher();
        let cache = cache().await;
        let request = Request::get(url("https://app.example/app.js"));

        cache.put(&request, &Response::new(200, "A")).await.unwrap();
        mock.respond("https://app.example/app.js", Response::new(200, "B"));

        let response = run(StrategyKind::StaleWhileRevalidate, &dynamic, &cache, &request, None)
            .await
            .unwrap();
        assert_eq!(response.body.as_ref(), b"A");

        assert!(eventually_cached(&cache, &request, b"B").await);
    }

    #[tokio::test]
    async fn test_swr_miss_awaits_network() {
        let (mock, dynamic) = fetcher();
        let cache = cache().await;
        let request = Request::get(url("https://app.example/app.js"));

        mock.respond("https://app.example/app.js", Response::new(200, "B"));

        let response = run(StrategyKind::StaleWhileRevalidate, &dynamic, &cache, &request, None)
            .await
            .unwrap();
        assert_eq!(response.body.as_ref(), b"B");
        assert_eq!(cache.lookup(&request).await.unwrap().unwrap().body.as_ref(), b"B");
    }

    #[tokio::test]
    async fn test_swr_miss_network_failure_surfaces() {
        let (_mock, dynamic) = fetcher();
        let cache = cache().await;
        let request = Request::get(url("https://app.example/app.js"));

        let result = run(StrategyKind::StaleWhileRevalidate, &dynamic, &cache, &request, None).await;
        assert!(matches!(result, Err(Error::NetworkFailure(_))));
    }

    #[tokio::test]
    async fn test_swr_background_failure_keeps_stale_entry() {
        let (_mock, dynamic) = fetcher();
        let cache = cache().await;
        let request = Request::get(url("https://app.example/app.js"));

        cache.put(&request, &Response::new(200, "A")).await.unwrap();

        let response = run(StrategyKind::StaleWhileRevalidate, &dynamic, &cache, &request, None)
            .await
            .unwrap();
        assert_eq!(response.body.as_ref(), b"A");

        // The failed refresh must not clobber the entry.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(cache.lookup(&request).await.unwrap().unwrap().body.as_ref(), b"A");
    }
}
