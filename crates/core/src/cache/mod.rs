//! Versioned response cache.
//!
//! A cache is split into named generations; each generation maps a
//! [`RequestKey`] to a [`StoredResponse`]. Generations are created lazily and
//! only ever deleted as a whole. Two backends implement [`CacheStore`]:
//!
//! - [`CacheDb`]: SQLite via tokio-rusqlite, WAL mode, schema migrations
//! - [`MemoryStore`]: process-local maps for ephemeral runs and tests

pub mod connection;
pub mod entries;
pub mod generations;
pub mod hash;
pub mod memory;
pub mod migrations;

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use url::Url;

pub use crate::Error;
use crate::http::{Request, Response};
use crate::net::Network;

pub use connection::CacheDb;
pub use memory::MemoryStore;

/// Identity of a cached request: method plus canonical URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestKey {
    pub method: String,
    pub url: String,
}

impl RequestKey {
    pub fn new(method: &str, url: &Url) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);
        Self { method: method.to_ascii_uppercase(), url: url.into() }
    }

    pub fn from_request(request: &Request) -> Self {
        Self::new(&request.method, &request.url)
    }

    /// Storage digest of this key.
    pub fn hash(&self) -> String {
        hash::compute_cache_key(&self.method, &self.url)
    }
}

impl std::fmt::Display for RequestKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// Snapshot of a response taken when it was written to the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredResponse {
    pub key: RequestKey,
    pub response: Response,
    pub stored_at: String,
}

/// Storage backend holding every cache generation.
///
/// Single-entry operations are atomic; concurrent writers to the same key
/// resolve as last-writer-wins.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Create the generation if it does not exist yet.
    async fn open(&self, name: &str) -> Result<(), Error>;

    /// Names of all persisted generations, sorted.
    async fn list_names(&self) -> Result<Vec<String>, Error>;

    /// Drop a generation and all its entries. Returns false if it was absent.
    async fn delete(&self, name: &str) -> Result<bool, Error>;

    async fn match_entry(&self, name: &str, key: &RequestKey) -> Result<Option<StoredResponse>, Error>;

    /// Insert or replace an entry, creating the generation if needed.
    async fn put(&self, name: &str, key: &RequestKey, response: &Response) -> Result<(), Error>;

    async fn keys(&self, name: &str) -> Result<Vec<RequestKey>, Error>;
}

/// Per-asset failure recorded while pre-caching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AssetFailure {
    pub url: String,
    pub reason: String,
}

/// Outcome of [`CacheHandle::add_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AddAllReport {
    /// URLs now present in the generation, in manifest order.
    pub stored: Vec<String>,
    /// URLs that could not be fetched or stored, in manifest order.
    pub failed: Vec<AssetFailure>,
}

impl AddAllReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Handle on one named generation of a [`CacheStore`].
#[derive(Clone)]
pub struct CacheHandle {
    store: Arc<dyn CacheStore>,
    name: String,
}

impl std::fmt::Debug for CacheHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheHandle").field("name", &self.name).finish_non_exhaustive()
    }
}

impl CacheHandle {
    /// Open (creating if absent) the generation called `name`.
    pub async fn open(store: Arc<dyn CacheStore>, name: &str) -> Result<Self, Error> {
        store.open(name).await?;
        Ok(Self::attach(store, name))
    }

    /// Refer to a generation without creating it. Lookups on a missing
    /// generation miss; the first `put` creates it.
    pub fn attach(store: Arc<dyn CacheStore>, name: &str) -> Self {
        Self { store, name: name.to_string() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up a request. Non-GET requests never match and never reach the store.
    pub async fn match_request(&self, request: &Request) -> Result<Option<StoredResponse>, Error> {
        if !request.is_get() {
            return Ok(None);
        }
        self.store
            .match_entry(&self.name, &RequestKey::from_request(request))
            .await
    }

    /// Store a response for a request.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` for non-GET requests and for responses
    /// that are not cacheable; nothing is written in either case.
    pub async fn put(&self, request: &Request, response: &Response) -> Result<(), Error> {
        if !request.is_get() {
            return Err(Error::InvalidInput(format!("cannot cache {} request", request.method)));
        }
        if !response.is_cacheable() {
            return Err(Error::InvalidInput(format!(
                "response {} ({}) is not cacheable",
                response.status, response.kind
            )));
        }
        self.store
            .put(&self.name, &RequestKey::from_request(request), response)
            .await
    }

    pub async fn keys(&self) -> Result<Vec<RequestKey>, Error> {
        self.store.keys(&self.name).await
    }

    /// Fetch one URL and store the response.
    ///
    /// A non-cacheable response is treated as a failure for this URL.
    pub async fn add(&self, network: &dyn Network, url: &Url) -> Result<(), Error> {
        let request = Request::get(url.clone());
        let response = network.fetch(&request).await?;
        if !response.is_cacheable() {
            return Err(Error::HttpError(format!("status {} ({})", response.status, response.kind)));
        }
        self.put(&request, &response).await
    }

    /// Fetch and store every URL, each as an independent task.
    ///
    /// All fetches start at once; a slow or failing URL never holds up or
    /// cancels the others. Duplicate URLs are fetched once.
    pub async fn add_all(&self, network: Arc<dyn Network>, urls: &[Url]) -> AddAllReport {
        let mut seen = HashSet::new();
        let unique: Vec<&Url> = urls.iter().filter(|url| seen.insert(RequestKey::new("GET", url).url)).collect();
        if unique.len() < urls.len() {
            tracing::debug!(cache = %self.name, duplicates = urls.len() - unique.len(), "skipping duplicate URLs");
        }

        let mut join_set = JoinSet::new();
        for (index, url) in unique.iter().enumerate() {
            let url = (*url).clone();
            let network = network.clone();
            let handle = self.clone();

            join_set.spawn(async move {
                let result = handle.add(network.as_ref(), &url).await;
                (index, result)
            });
        }

        let mut outcomes: Vec<Option<Result<(), String>>> = vec![None; unique.len()];
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, result)) => outcomes[index] = Some(result.map_err(|e| e.to_string())),
                Err(e) => tracing::warn!(cache = %self.name, error = %e, "pre-cache task aborted"),
            }
        }

        let mut report = AddAllReport::default();
        for (url, outcome) in unique.into_iter().zip(outcomes) {
            let url = url.to_string();
            match outcome {
                Some(Ok(())) => report.stored.push(url),
                Some(Err(reason)) => report.failed.push(AssetFailure { url, reason }),
                None => report.failed.push(AssetFailure { url, reason: "task aborted".into() }),
            }
        }
        report
    }
}
