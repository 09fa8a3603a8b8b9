//! Worker registration and lifecycle state.
//!
//! Plays the part of the page runtime: it moves the worker through install
//! and activate, and only routes fetches through the worker once it has
//! claimed the page. Before that, requests go straight to the network.

use keepsake_core::worker::{ActivateReport, InstallReport};
use keepsake_core::{Error, FetchOutcome, OfflineWorker, Request, Response, ResponseSource, WorkerState};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Reports from one install run, plus activation when it followed directly.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StartReport {
    pub install: InstallReport,
    /// Present when install asked to skip waiting and activation ran.
    pub activate: Option<ActivateReport>,
}

/// A response handed back to the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Served {
    pub response: Response,
    pub source: ResponseSource,
}

#[derive(Debug, Clone, Copy, Default)]
struct Lifecycle {
    /// Where the latest install/activate run stands.
    state: WorkerState,
    /// Set by the first activation. A later install keeps control of the page.
    controlling: bool,
}

impl Lifecycle {
    fn transition(&mut self, next: WorkerState) {
        tracing::debug!(from = %self.state, to = %next, controlling = self.controlling, "worker state change");
        self.state = next;
        self.controlling |= next.can_intercept_fetch();
    }
}

pub struct Registration {
    worker: OfflineWorker,
    lifecycle: RwLock<Lifecycle>,
}

impl Registration {
    pub fn new(worker: OfflineWorker) -> Self {
        Self { worker, lifecycle: RwLock::new(Lifecycle::default()) }
    }

    pub fn worker(&self) -> &OfflineWorker {
        &self.worker
    }

    pub async fn state(&self) -> WorkerState {
        self.lifecycle.read().await.state
    }

    /// Whether fetches from the page go through the worker.
    pub async fn is_controlling(&self) -> bool {
        self.lifecycle.read().await.controlling
    }

    async fn set_state(&self, next: WorkerState) {
        self.lifecycle.write().await.transition(next);
    }

    /// Run the install phase. Always resolves.
    ///
    /// A page already controlled stays controlled while this runs.
    pub async fn install(&self) -> InstallReport {
        self.set_state(WorkerState::Installing).await;
        let report = self.worker.on_install().await;
        self.set_state(WorkerState::Installed).await;
        report
    }

    /// Run the activate phase.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidState` unless the worker is installed (or
    /// already active, which re-runs the cleanup). An activation already in
    /// progress also makes this fail.
    pub async fn activate(&self) -> Result<ActivateReport, Error> {
        {
            let mut lifecycle = self.lifecycle.write().await;
            if !matches!(lifecycle.state, WorkerState::Installed | WorkerState::Activated) {
                return Err(Error::InvalidState(format!("cannot activate a worker that is {}", lifecycle.state)));
            }
            lifecycle.transition(WorkerState::Activating);
        }

        let report = self.worker.on_activate().await;
        self.set_state(WorkerState::Activated).await;

        if report.claim_clients {
            tracing::info!(cache = %report.cache_name, "worker active, controlling open pages");
        }

        Ok(report)
    }

    /// Install, then activate straight away if install asked to skip waiting.
    pub async fn start(&self) -> StartReport {
        let install = self.install().await;

        let activate = if install.skip_waiting {
            match self.activate().await {
                Ok(report) => Some(report),
                Err(e) => {
                    tracing::warn!(error = %e, "activation after install failed");
                    None
                }
            }
        } else {
            None
        };

        StartReport { install, activate }
    }

    /// Serve a request from the page.
    ///
    /// # Errors
    ///
    /// Propagates the failure unchanged when neither network nor cache could
    /// answer.
    pub async fn fetch(&self, request: Request) -> Result<Served, Error> {
        if !self.is_controlling().await {
            return self.passthrough(&request).await;
        }

        match self.worker.on_fetch(request.clone()).await? {
            FetchOutcome::Passthrough => self.passthrough(&request).await,
            FetchOutcome::Respond { response, source } => Ok(Served { response, source }),
        }
    }

    async fn passthrough(&self, request: &Request) -> Result<Served, Error> {
        let response = self.worker.network().fetch(request).await?;
        Ok(Served { response, source: ResponseSource::Passthrough })
    }
}
