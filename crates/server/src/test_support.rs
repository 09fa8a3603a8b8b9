//! Shared fixtures for server tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use keepsake_core::{CacheStore, Error, MemoryStore, Network, OfflineWorker, Request, Response, WorkerConfig};
use url::Url;

pub const ORIGIN: &str = "https://invite.example/";

/// Serves a fixed set of pages; anything else is a transport error.
pub struct StaticNetwork {
    pages: HashMap<String, Response>,
    offline: AtomicBool,
    calls: AtomicUsize,
}

impl StaticNetwork {
    /// The three-page site the test worker pre-caches.
    pub fn site() -> Self {
        let pages = [
            ("https://invite.example/", Response::ok("<html>home</html>").with_header("content-type", "text/html")),
            (
                "https://invite.example/index.html",
                Response::ok("<html>index</html>").with_header("content-type", "text/html; charset=utf-8"),
            ),
            (
                "https://invite.example/Photos/01.jpg",
                Response::ok(vec![0xffu8, 0xd8, 0xff]).with_header("content-type", "image/jpeg"),
            ),
        ];
        Self {
            pages: pages.into_iter().map(|(url, r)| (url.to_string(), r)).collect(),
            offline: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Network for StaticNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::HttpError("offline".into()));
        }
        self.pages
            .get(request.url.as_str())
            .cloned()
            .ok_or_else(|| Error::HttpError(format!("connection refused: {}", request.url)))
    }
}

/// A worker over a fresh in-memory store, pre-caching the three-page site.
pub fn worker(network: Arc<StaticNetwork>) -> OfflineWorker {
    let origin = Url::parse(ORIGIN).unwrap();
    let config = WorkerConfig {
        version_tag: "wedding-invitation-cache-v1".into(),
        manifest: ["/", "/index.html", "/Photos/01.jpg"].iter().map(|p| origin.join(p).unwrap()).collect(),
        media_markers: vec!["/Videos/".into(), "/Photos/".into()],
    };
    let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
    OfflineWorker::new(config, store, network)
}

/// Text payload of the first content item in a tool result.
pub fn result_json(result: &rmcp::model::CallToolResult) -> serde_json::Value {
    let content = serde_json::to_value(&result.content[0]).unwrap();
    let text = content.get("text").and_then(|t| t.as_str()).unwrap();
    serde_json::from_str(text).unwrap()
}
