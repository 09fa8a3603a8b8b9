//! Fetch interception: classify, then cache-first or network-first.
//!
//! Each strategy makes at most one fallback hop. Cache-first goes cache,
//! network, cache. Network-first goes network, cache. Cacheable network
//! responses are written through in a detached task, so the page never
//! waits on the store.

use url::Url;

use super::{FetchOutcome, OfflineWorker};
use crate::Error;
use crate::cache::CacheHandle;
use crate::http::{Request, Response};

/// How a request is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Large immutable media: cache, then network.
    CacheFirst,
    /// Documents and everything else: network, then cache.
    NetworkFirst,
}

/// Pick the strategy for a URL by looking for a media marker in its path.
pub fn classify(url: &Url, media_markers: &[String]) -> Strategy {
    let path = url.path();
    if media_markers.iter().any(|marker| path.contains(marker.as_str())) {
        Strategy::CacheFirst
    } else {
        Strategy::NetworkFirst
    }
}

impl OfflineWorker {
    /// Intercept one request from the controlled page.
    ///
    /// Non-GET requests are declined untouched. For GET requests the result
    /// is either a response (with its source) or `Error::FetchFailed` once
    /// both the network and the cache have come up empty.
    pub async fn on_fetch(&self, request: Request) -> Result<FetchOutcome, Error> {
        if !request.is_get() {
            return Ok(FetchOutcome::Passthrough);
        }

        match classify(&request.url, &self.config.media_markers) {
            Strategy::CacheFirst => self.cache_first(request).await,
            Strategy::NetworkFirst => self.network_first(request).await,
        }
    }

    async fn cache_first(&self, request: Request) -> Result<FetchOutcome, Error> {
        let cache = self.current_cache();

        match cache.match_request(&request).await {
            Ok(Some(hit)) => {
                tracing::debug!(url = %request.url, "serving from cache");
                return Ok(FetchOutcome::from_cache(hit.response));
            }
            Ok(None) => tracing::debug!(url = %request.url, "cache miss"),
            Err(e) => tracing::warn!(url = %request.url, error = %e, "cache lookup failed, going to network"),
        }

        match self.network.fetch(&request).await {
            Ok(response) => {
                if response.is_cacheable() {
                    tracing::debug!(url = %request.url, "caching new asset");
                    write_through(&cache, &request, &response);
                }
                Ok(FetchOutcome::from_network(response))
            }
            // Checked again: a concurrent fetch may have stored it meanwhile.
            Err(e) => fallback(&cache, &request, e).await,
        }
    }

    async fn network_first(&self, request: Request) -> Result<FetchOutcome, Error> {
        let cache = self.current_cache();

        match self.network.fetch(&request).await {
            Ok(response) => {
                if response.is_cacheable() {
                    write_through(&cache, &request, &response);
                }
                Ok(FetchOutcome::from_network(response))
            }
            Err(e) => fallback(&cache, &request, e).await,
        }
    }
}

/// Store a copy of the response without holding up the caller.
fn write_through(cache: &CacheHandle, request: &Request, response: &Response) {
    let cache = cache.clone();
    let request = request.clone();
    let response = response.clone();

    tokio::spawn(async move {
        if let Err(e) = cache.put(&request, &response).await {
            tracing::warn!(cache = cache.name(), url = %request.url, error = %e, "write-through failed");
        }
    });
}

/// Serve from cache after the network rejected the request.
async fn fallback(cache: &CacheHandle, request: &Request, network_error: Error) -> Result<FetchOutcome, Error> {
    match cache.match_request(request).await {
        Ok(Some(hit)) => {
            tracing::debug!(url = %request.url, error = %network_error, "network failed, serving cached copy");
            Ok(FetchOutcome::from_cache(hit.response))
        }
        Ok(None) => {
            tracing::debug!(url = %request.url, error = %network_error, "network failed, nothing cached");
            Err(Error::FetchFailed(format!("{}: {network_error}", request.url)))
        }
        Err(cache_error) => Err(Error::FetchFailed(format!(
            "{}: {network_error}; cache unavailable: {cache_error}",
            request.url
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::cache::{CacheDb, CacheStore, MemoryStore, RequestKey, StoredResponse};
    use crate::http::ResponseKind;
    use crate::net::Network;
    use crate::testing::{CountingStore, MockNetwork};
    use crate::worker::{ResponseSource, WorkerConfig};

    fn url(path: &str) -> Url {
        Url::parse("https://invite.example/").unwrap().join(path).unwrap()
    }

    fn markers() -> Vec<String> {
        vec!["/Videos/".into(), "/Photos/".into()]
    }

    fn worker(store: Arc<dyn CacheStore>, network: Arc<dyn Network>) -> OfflineWorker {
        let config = WorkerConfig {
            version_tag: "v1".into(),
            manifest: Vec::new(),
            media_markers: markers(),
        };
        OfflineWorker::new(config, store, network)
    }

    /// Poll until the detached write-through has landed and matches `body`.
    async fn settled(cache: &CacheHandle, request: &Request, body: &str) -> StoredResponse {
        for _ in 0..400 {
            if let Some(hit) = cache.match_request(request).await.unwrap()
                && hit.response.body == body
            {
                return hit;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("cache never settled for {}", request.url);
    }

    #[test]
    fn test_classify_media_paths() {
        assert_eq!(classify(&url("/Photos/01.jpg"), &markers()), Strategy::CacheFirst);
        assert_eq!(classify(&url("/Videos/engagement.mp4"), &markers()), Strategy::CacheFirst);
        assert_eq!(classify(&url("/site/Photos/Ashish_001.jpg"), &markers()), Strategy::CacheFirst);
    }

    #[test]
    fn test_classify_documents() {
        assert_eq!(classify(&url("/"), &markers()), Strategy::NetworkFirst);
        assert_eq!(classify(&url("/index.html"), &markers()), Strategy::NetworkFirst);
        assert_eq!(classify(&url("/photos/01.jpg"), &markers()), Strategy::NetworkFirst);
        assert_eq!(classify(&url("/Photos"), &markers()), Strategy::NetworkFirst);
    }

    #[test]
    fn test_classify_ignores_query() {
        assert_eq!(classify(&url("/index.html?next=/Photos/01.jpg"), &markers()), Strategy::NetworkFirst);
    }

    #[tokio::test]
    async fn test_cache_first_hit_skips_network() {
        let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
        let network = Arc::new(MockNetwork::new());
        network.respond(url("/Photos/01.jpg").as_str(), Response::ok("fresh"));
        let worker = worker(store.clone(), network.clone());
        let request = Request::get(url("/Photos/01.jpg"));
        worker.current_cache().put(&request, &Response::ok("stored")).await.unwrap();

        let outcome = worker.on_fetch(request).await.unwrap();

        assert_eq!(outcome.source(), ResponseSource::Cache);
        assert_eq!(outcome.response().unwrap().body, "stored");
        assert_eq!(network.calls(), 0);
    }

    #[tokio::test]
    async fn test_cache_first_miss_then_hit() {
        let store: Arc<dyn CacheStore> = Arc::new(CacheDb::open_in_memory().await.unwrap());
        let network = Arc::new(MockNetwork::new());
        let photo = url("/Photos/05.jpg");
        network.respond(photo.as_str(), Response::ok(vec![1u8, 2, 3]).with_header("content-type", "image/jpeg"));
        let worker = worker(store, network.clone());

        let first = worker.on_fetch(Request::get(photo.clone())).await.unwrap();
        assert_eq!(first.source(), ResponseSource::Network);
        assert_eq!(first.response().unwrap().body, vec![1u8, 2, 3]);
        assert_eq!(network.calls(), 1);

        let stored = settled(&worker.current_cache(), &Request::get(photo.clone()), "\u{1}\u{2}\u{3}").await;
        assert_eq!(stored.response.header("content-type"), Some("image/jpeg"));

        let second = worker.on_fetch(Request::get(photo)).await.unwrap();
        assert_eq!(second.source(), ResponseSource::Cache);
        assert_eq!(second.response().unwrap().body, vec![1u8, 2, 3]);
        assert_eq!(network.calls(), 1);
    }

    #[tokio::test]
    async fn test_cache_first_non_cacheable_passed_through() {
        let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
        let network = Arc::new(MockNetwork::new());
        let photo = url("/Photos/404.jpg");
        network.respond(photo.as_str(), Response::new(404, ResponseKind::Basic, "not found"));
        let worker = worker(store.clone(), network);

        let outcome = worker.on_fetch(Request::get(photo)).await.unwrap();

        assert_eq!(outcome.response().unwrap().status, 404);
        assert_eq!(outcome.response().unwrap().body, "not found");
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(store.keys("v1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cache_first_offline_without_copy_fails() {
        let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
        let network = Arc::new(MockNetwork::new());
        network.set_offline(true);
        let worker = worker(store, network.clone());

        let result = worker.on_fetch(Request::get(url("/Videos/engagement.mp4"))).await;

        assert!(matches!(result, Err(Error::FetchFailed(_))));
        assert_eq!(network.calls(), 1);
    }

    /// Network that loses the race: a concurrent writer stores the asset
    /// just before this fetch is rejected.
    struct RacingNetwork {
        store: Arc<dyn CacheStore>,
    }

    #[async_trait]
    impl Network for RacingNetwork {
        async fn fetch(&self, request: &Request) -> Result<Response, Error> {
            self.store
                .put("v1", &RequestKey::from_request(request), &Response::ok("from the other fetch"))
                .await?;
            Err(Error::FetchTimeout("20s elapsed".into()))
        }
    }

    #[tokio::test]
    async fn test_cache_first_rechecks_cache_after_network_failure() {
        let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
        let network = Arc::new(RacingNetwork { store: store.clone() });
        let worker = worker(store, network);

        let outcome = worker.on_fetch(Request::get(url("/Photos/01.jpg"))).await.unwrap();

        assert_eq!(outcome.source(), ResponseSource::Cache);
        assert_eq!(outcome.response().unwrap().body, "from the other fetch");
    }

    #[tokio::test]
    async fn test_network_first_updates_cache() {
        let store: Arc<dyn CacheStore> = Arc::new(CacheDb::open_in_memory().await.unwrap());
        let network = Arc::new(MockNetwork::new());
        let page = url("/index.html");
        network.respond(page.as_str(), Response::ok("<html>H</html>"));
        let worker = worker(store, network.clone());

        let outcome = worker.on_fetch(Request::get(page.clone())).await.unwrap();
        assert_eq!(outcome.source(), ResponseSource::Network);
        assert_eq!(outcome.response().unwrap().body, "<html>H</html>");

        settled(&worker.current_cache(), &Request::get(page.clone()), "<html>H</html>").await;

        network.set_offline(true);
        let offline = worker.on_fetch(Request::get(page)).await.unwrap();
        assert_eq!(offline.source(), ResponseSource::Cache);
        assert_eq!(offline.response().unwrap().body, "<html>H</html>");
    }

    #[tokio::test]
    async fn test_network_first_prefers_live_response() {
        let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
        let network = Arc::new(MockNetwork::new());
        let page = url("/index.html");
        network.respond(page.as_str(), Response::ok("new"));
        let worker = worker(store, network);
        worker
            .current_cache()
            .put(&Request::get(page.clone()), &Response::ok("old"))
            .await
            .unwrap();

        let outcome = worker.on_fetch(Request::get(page.clone())).await.unwrap();
        assert_eq!(outcome.response().unwrap().body, "new");

        settled(&worker.current_cache(), &Request::get(page), "new").await;
    }

    #[tokio::test]
    async fn test_network_first_non_cacheable_leaves_cache_alone() {
        let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
        let network = Arc::new(MockNetwork::new());
        let page = url("/index.html");
        network.respond(page.as_str(), Response::new(500, ResponseKind::Basic, "oops"));
        let worker = worker(store, network);
        worker
            .current_cache()
            .put(&Request::get(page.clone()), &Response::ok("good"))
            .await
            .unwrap();

        let outcome = worker.on_fetch(Request::get(page.clone())).await.unwrap();
        assert_eq!(outcome.source(), ResponseSource::Network);
        assert_eq!(outcome.response().unwrap().status, 500);

        tokio::time::sleep(Duration::from_millis(20)).await;
        let stored = worker.current_cache().match_request(&Request::get(page)).await.unwrap().unwrap();
        assert_eq!(stored.response.body, "good");
    }

    #[tokio::test]
    async fn test_network_first_offline_without_copy_fails() {
        let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
        let network = Arc::new(MockNetwork::new());
        network.set_offline(true);
        let worker = worker(store, network);

        let result = worker.on_fetch(Request::get(url("/index.html"))).await;
        assert!(matches!(result, Err(Error::FetchFailed(msg)) if msg.contains("/index.html")));
    }

    #[tokio::test]
    async fn test_non_get_is_passed_through() {
        let store = Arc::new(CountingStore::new());
        let network = Arc::new(MockNetwork::new());
        let worker = worker(store.clone(), network.clone());
        let photo = url("/Photos/01.jpg");
        let page = url("/index.html");
        worker.current_cache().put(&Request::get(photo.clone()), &Response::ok("jpeg")).await.unwrap();
        let writes = store.writes();

        for target in [&photo, &page] {
            for method in ["POST", "PUT", "DELETE", "HEAD"] {
                let request = Request::new(method, target.clone()).with_body("payload");
                let outcome = worker.on_fetch(request).await.unwrap();
                assert_eq!(outcome, FetchOutcome::Passthrough);
            }
        }

        assert_eq!(store.reads(), 0);
        assert_eq!(store.writes(), writes);
        assert_eq!(network.calls(), 0);
        assert_eq!(store.keys("v1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_request_headers_reach_network() {
        let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
        let network = Arc::new(MockNetwork::new());
        let page = url("/index.html");
        network.respond(page.as_str(), Response::ok("<html>"));
        let worker = worker(store, network.clone());

        let request = Request::get(page).with_header("accept-language", "hi-IN");
        worker.on_fetch(request.clone()).await.unwrap();

        assert_eq!(network.requests(), vec![request]);
    }
}
