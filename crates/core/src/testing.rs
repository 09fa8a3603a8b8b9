//! Scripted network and store doubles for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::Error;
use crate::cache::{CacheStore, MemoryStore, RequestKey, StoredResponse};
use crate::http::{Request, Response};
use crate::net::Network;

#[derive(Clone)]
enum Route {
    Respond(Response),
    Delayed(Duration, Response),
    Fail,
}

/// Network double answering from a URL table.
///
/// Unknown URLs are rejected as unreachable. Every call is counted, so tests
/// can assert that a cache hit never touched the network.
#[derive(Default)]
pub struct MockNetwork {
    routes: Mutex<HashMap<String, Route>>,
    offline: AtomicBool,
    calls: AtomicUsize,
    requests: Mutex<Vec<Request>>,
}

impl MockNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, url: &str, response: Response) {
        self.routes.lock().unwrap().insert(url.to_string(), Route::Respond(response));
    }

    /// Answer only after `delay`, like a large download on a slow link.
    pub fn respond_after(&self, url: &str, delay: Duration, response: Response) {
        self.routes.lock().unwrap().insert(url.to_string(), Route::Delayed(delay, response));
    }

    pub fn fail(&self, url: &str) {
        self.routes.lock().unwrap().insert(url.to_string(), Route::Fail);
    }

    /// Reject every request until switched back on.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Network for MockNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::HttpError("network error: offline".into()));
        }

        let route = self.routes.lock().unwrap().get(request.url.as_str()).cloned();
        match route {
            Some(Route::Respond(response)) => Ok(response),
            Some(Route::Delayed(delay, response)) => {
                tokio::time::sleep(delay).await;
                Ok(response)
            }
            Some(Route::Fail) | None => Err(Error::HttpError(format!("network error: {} unreachable", request.url))),
        }
    }
}

/// In-memory store that counts entry reads and writes.
#[derive(Default)]
pub struct CountingStore {
    inner: MemoryStore,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl CountingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CacheStore for CountingStore {
    async fn open(&self, name: &str) -> Result<(), Error> {
        self.inner.open(name).await
    }

    async fn list_names(&self) -> Result<Vec<String>, Error> {
        self.inner.list_names().await
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        self.inner.delete(name).await
    }

    async fn match_entry(&self, name: &str, key: &RequestKey) -> Result<Option<StoredResponse>, Error> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.match_entry(name, key).await
    }

    async fn put(&self, name: &str, key: &RequestKey, response: &Response) -> Result<(), Error> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.put(name, key, response).await
    }

    async fn keys(&self, name: &str) -> Result<Vec<RequestKey>, Error> {
        self.inner.keys(name).await
    }
}
