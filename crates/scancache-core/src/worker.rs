//! Event entry points of the proxy.
//!
//! The host delivers four events: `install`, `activate`, `fetch` and
//! `sync`. Each handler runs to completion and never fails; `fetch` may be
//! called concurrently from many tasks.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use crate::bootstrap::{Bootstrapper, InstallReport};
use crate::cache::CacheStorage;
use crate::clients::ClientRegistry;
use crate::config::ProxyConfig;
use crate::generation::{ActivationReport, GenerationManager};
use crate::http::Request;
use crate::network::Network;
use crate::notifier::ReconnectionNotifier;
use crate::router::{FetchDecision, RequestRouter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
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

#[derive(Debug)]
pub enum WorkerEvent {
    Install,
    Activate,
    Fetch(Request),
    Sync { tag: String },
}

#[derive(Debug)]
pub enum WorkerOutcome {
    Installed(InstallReport),
    Activated(ActivationReport),
    Fetched(FetchDecision),
    Synced { notified: usize },
}

pub struct OfflineWorker {
    config: Arc<ProxyConfig>,
    bootstrapper: Bootstrapper,
    generations: GenerationManager,
    router: RequestRouter,
    notifier: ReconnectionNotifier,
    state: RwLock<WorkerState>,
    skip_waiting: AtomicBool,
}

impl OfflineWorker {
    pub fn new(
        config: ProxyConfig,
        storage: Arc<dyn CacheStorage>,
        network: Arc<dyn Network>,
        clients: Arc<dyn ClientRegistry>,
    ) -> Self {
        let config = Arc::new(config);
        Self {
            bootstrapper: Bootstrapper::new(config.clone(), storage.clone(), network.clone()),
            generations: GenerationManager::new(config.clone(), storage.clone(), clients.clone()),
            router: RequestRouter::new(config.clone(), storage, network),
            notifier: ReconnectionNotifier::new(config.clone(), clients),
            config,
            state: RwLock::new(WorkerState::Parsed),
            skip_waiting: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    /// Whether install asked to replace the previous version immediately
    pub fn skips_waiting(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    async fn transition(&self, next: WorkerState) {
        let mut state = self.state.write().await;
        let from = *state;
        info!(from = %from, to = %next, cache = %self.config.cache_name(), "Worker state change");
        *state = next;
    }

    pub async fn handle(&self, event: WorkerEvent) -> WorkerOutcome {
        match event {
            WorkerEvent::Install => WorkerOutcome::Installed(self.install().await),
            WorkerEvent::Activate => WorkerOutcome::Activated(self.activate().await),
            WorkerEvent::Fetch(request) => WorkerOutcome::Fetched(self.fetch(&request).await),
            WorkerEvent::Sync { tag } => WorkerOutcome::Synced {
                notified: self.sync(&tag).await,
            },
        }
    }

    /// Precache, then signal readiness to take over without waiting
    pub async fn install(&self) -> InstallReport {
        self.transition(WorkerState::Installing).await;
        let report = self.bootstrapper.install().await;
        self.skip_waiting.store(true, Ordering::SeqCst);
        self.transition(WorkerState::Installed).await;
        report
    }

    /// Drop stale generations, then claim all open clients
    pub async fn activate(&self) -> ActivationReport {
        self.transition(WorkerState::Activating).await;
        let report = self.generations.activate().await;
        self.transition(WorkerState::Activated).await;
        report
    }

    pub async fn fetch(&self, request: &Request) -> FetchDecision {
        self.router.fetch(request).await
    }

    pub async fn sync(&self, tag: &str) -> usize {
        self.notifier.sync(tag).await
    }
}
