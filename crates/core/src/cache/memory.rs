//! In-process cache store.
//!
//! Holds every generation in a `HashMap` behind a tokio `RwLock`. Nothing
//! survives a restart; used when `in_memory` is configured and in tests.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{CacheStore, RequestKey, StoredResponse};
use crate::Error;
use crate::http::Response;

type Generation = HashMap<String, StoredResponse>;

#[derive(Debug, Default)]
pub struct MemoryStore {
    generations: RwLock<HashMap<String, Generation>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn open(&self, name: &str) -> Result<(), Error> {
        let mut generations = self.generations.write().await;
        generations.entry(name.to_string()).or_default();
        Ok(())
    }

    async fn list_names(&self) -> Result<Vec<String>, Error> {
        let generations = self.generations.read().await;
        let mut names: Vec<String> = generations.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        let mut generations = self.generations.write().await;
        Ok(generations.remove(name).is_some())
    }

    async fn match_entry(&self, name: &str, key: &RequestKey) -> Result<Option<StoredResponse>, Error> {
        let generations = self.generations.read().await;
        Ok(generations
            .get(name)
            .and_then(|generation| generation.get(&key.hash()))
            .cloned())
    }

    async fn put(&self, name: &str, key: &RequestKey, response: &Response) -> Result<(), Error> {
        let stored = StoredResponse {
            key: key.clone(),
            response: response.clone(),
            stored_at: chrono::Utc::now().to_rfc3339(),
        };
        let mut generations = self.generations.write().await;
        generations
            .entry(name.to_string())
            .or_default()
            .insert(key.hash(), stored);
        Ok(())
    }

    async fn keys(&self, name: &str) -> Result<Vec<RequestKey>, Error> {
        let generations = self.generations.read().await;
        let mut keys: Vec<RequestKey> = generations
            .get(name)
            .map(|generation| generation.values().map(|stored| stored.key.clone()).collect())
            .unwrap_or_default();
        keys.sort_by(|a, b| a.url.cmp(&b.url));
        Ok(keys)
    }
}
