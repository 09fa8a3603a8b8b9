//! Install and activate phases.
//!
//! Both phases absorb every failure: they log, report, and resolve. A
//! worker that cannot pre-cache one asset must still come up and serve the
//! rest of the page.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;

use super::OfflineWorker;
use crate::cache::{AddAllReport, AssetFailure, CacheHandle};

/// Lifecycle states a worker moves through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    /// Constructed, no lifecycle event seen yet.
    #[default]
    Parsed,
    Installing,
    /// Installed, waiting to activate.
    Installed,
    Activating,
    /// Controlling pages and intercepting fetches.
    Activated,
}

impl WorkerState {
    pub fn can_intercept_fetch(&self) -> bool {
        matches!(self, WorkerState::Activated)
    }
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WorkerState::Parsed => "parsed",
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Activated => "activated",
        };
        f.write_str(s)
    }
}

/// Result of the install phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct InstallReport {
    /// Generation that was populated.
    pub cache_name: String,
    /// Manifest URLs now cached.
    pub stored: Vec<String>,
    /// Manifest URLs that could not be cached.
    pub failed: Vec<AssetFailure>,
    /// Ask the runtime to activate without waiting for old pages to close.
    pub skip_waiting: bool,
}

/// A generation that could not be deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct GenerationFailure {
    pub name: String,
    pub reason: String,
}

/// Result of the activate phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ActivateReport {
    /// Generation kept.
    pub cache_name: String,
    /// Stale generations removed, sorted.
    pub deleted: Vec<String>,
    pub failed: Vec<GenerationFailure>,
    /// Set when the generation list itself could not be read.
    pub error: Option<String>,
    /// Take control of already-open pages immediately.
    pub claim_clients: bool,
}

impl OfflineWorker {
    /// Open the current generation and pre-cache the manifest.
    ///
    /// Never fails: assets that cannot be fetched or stored are logged and
    /// listed in the report.
    pub async fn on_install(&self) -> InstallReport {
        let cache_name = self.config.version_tag.clone();
        let manifest = &self.config.manifest;

        tracing::info!(cache = %cache_name, assets = manifest.len(), "caching assets");

        let report = match CacheHandle::open(self.store.clone(), &cache_name).await {
            Ok(cache) => {
                cache.add_all(self.network.clone(), manifest).await
            }
            Err(e) => {
                tracing::error!(cache = %cache_name, error = %e, "failed to open cache");
                AddAllReport {
                    stored: Vec::new(),
                    failed: manifest
                        .iter()
                        .map(|url| AssetFailure { url: url.to_string(), reason: format!("cache unavailable: {e}") })
                        .collect(),
                }
            }
        };

        for failure in &report.failed {
            tracing::warn!(url = %failure.url, reason = %failure.reason, "asset not cached");
        }

        tracing::info!(
            cache = %cache_name,
            stored = report.stored.len(),
            failed = report.failed.len(),
            "install finished"
        );

        InstallReport { cache_name, stored: report.stored, failed: report.failed, skip_waiting: true }
    }

    /// Delete every generation whose name is not the current version tag.
    ///
    /// Deletions run concurrently; the phase resolves once all have settled.
    pub async fn on_activate(&self) -> ActivateReport {
        let cache_name = self.config.version_tag.clone();
        let mut report = ActivateReport {
            cache_name: cache_name.clone(),
            deleted: Vec::new(),
            failed: Vec::new(),
            error: None,
            claim_clients: true,
        };

        let names = match self.store.list_names().await {
            Ok(names) => names,
            Err(e) => {
                tracing::error!(error = %e, "failed to list caches");
                report.error = Some(e.to_string());
                return report;
            }
        };

        let mut join_set = JoinSet::new();
        for name in names.into_iter().filter(|name| *name != cache_name) {
            let store = self.store.clone();
            join_set.spawn(async move {
                tracing::info!(cache = %name, "deleting old cache");
                let result = store.delete(&name).await;
                (name, result)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((name, Ok(_))) => report.deleted.push(name),
                Ok((name, Err(e))) => {
                    tracing::warn!(cache = %name, error = %e, "failed to delete old cache");
                    report.failed.push(GenerationFailure { name, reason: e.to_string() });
                }
                Err(e) => tracing::warn!(error = %e, "cache deletion task aborted"),
            }
        }

        report.deleted.sort();
        report.failed.sort_by(|a, b| a.name.cmp(&b.name));

        tracing::info!(cache = %cache_name, deleted = report.deleted.len(), "activation finished");

        report
    }
}
