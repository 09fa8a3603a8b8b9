//! Offline caching policy for the invitation page.
//!
//! [`OfflineWorker`] answers the three events the page runtime delivers:
//!
//! - install: pre-cache the asset manifest into the current generation
//! - activate: delete every generation but the current one
//! - fetch: classify the request and run cache-first or network-first
//!
//! The worker keeps no state of its own. The cache store and the network are
//! injected so the policy can run against SQLite and reqwest in production
//! and against in-memory doubles in tests.

pub mod lifecycle;
pub mod strategy;

use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::cache::{CacheHandle, CacheStore};
use crate::config::{AppConfig, ConfigError};
use crate::http::Response;
use crate::net::Network;

pub use lifecycle::{ActivateReport, GenerationFailure, InstallReport, WorkerState};
pub use strategy::{Strategy, classify};

/// Settings the policy is constructed with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Name of the current cache generation.
    pub version_tag: String,
    /// Resolved asset manifest.
    pub manifest: Vec<Url>,
    /// Path substrings that route a request to cache-first.
    pub media_markers: Vec<String>,
}

impl WorkerConfig {
    /// Build from validated application configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the origin or a manifest entry does
    /// not resolve.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            version_tag: config.cache_name.clone(),
            manifest: config.manifest()?,
            media_markers: config.media_markers.clone(),
        })
    }
}

/// Where a response handed back to the page came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    Cache,
    Network,
    /// The worker declined and the request went out unmodified.
    Passthrough,
}

/// Result of intercepting one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Not handled; the request proceeds with default network handling.
    Passthrough,
    Respond { response: Response, source: ResponseSource },
}

impl FetchOutcome {
    pub(crate) fn from_cache(response: Response) -> Self {
        Self::Respond { response, source: ResponseSource::Cache }
    }

    pub(crate) fn from_network(response: Response) -> Self {
        Self::Respond { response, source: ResponseSource::Network }
    }

    pub fn response(&self) -> Option<&Response> {
        match self {
            FetchOutcome::Passthrough => None,
            FetchOutcome::Respond { response, .. } => Some(response),
        }
    }

    pub fn source(&self) -> ResponseSource {
        match self {
            FetchOutcome::Passthrough => ResponseSource::Passthrough,
            FetchOutcome::Respond { source, .. } => *source,
        }
    }
}

/// The caching policy: one instance per process.
#[derive(Clone)]
pub struct OfflineWorker {
    config: WorkerConfig,
    store: Arc<dyn CacheStore>,
    network: Arc<dyn Network>,
}

impl std::fmt::Debug for OfflineWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineWorker").field("config", &self.config).finish_non_exhaustive()
    }
}

impl OfflineWorker {
    pub fn new(config: WorkerConfig, store: Arc<dyn CacheStore>, network: Arc<dyn Network>) -> Self {
        Self { config, store, network }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn version_tag(&self) -> &str {
        &self.config.version_tag
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    pub fn network(&self) -> &Arc<dyn Network> {
        &self.network
    }

    /// Handle on the current generation. Does not create it.
    pub fn current_cache(&self) -> CacheHandle {
        CacheHandle::attach(self.store.clone(), &self.config.version_tag)
    }
}
