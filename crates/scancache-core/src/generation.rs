//! Cache generation rotation on activate.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::cache::CacheStorage;
use crate::clients::ClientRegistry;
use crate::config::ProxyConfig;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivationReport {
    pub deleted: Vec<String>,
    /// Stale stores that could not be removed; retried next activation
    pub failed: Vec<String>,
    pub clients_claimed: usize,
}

pub struct GenerationManager {
    config: Arc<ProxyConfig>,
    storage: Arc<dyn CacheStorage>,
    clients: Arc<dyn ClientRegistry>,
}

impl GenerationManager {
    pub fn new(
        config: Arc<ProxyConfig>,
        storage: Arc<dyn CacheStorage>,
        clients: Arc<dyn ClientRegistry>,
    ) -> Self {
        Self {
            config,
            storage,
            clients,
        }
    }

    /// Delete every store but the current one, then claim all clients
    pub async fn activate(&self) -> ActivationReport {
        let current = self.config.cache_name();
        let mut report = ActivationReport::default();

        match self.storage.keys().await {
            Ok(names) => {
                let stale: Vec<String> = names.into_iter().filter(|n| *n != current).collect();
                let results = join_all(stale.iter().map(|name| self.storage.delete(name))).await;
                for (name, result) in stale.into_iter().zip(results) {
                    match result {
                        Ok(true) => {
                            info!(store = %name, "Deleted stale cache store");
                            report.deleted.push(name);
                        }
                        Ok(false) => debug!(store = %name, "Stale cache store already absent"),
                        Err(e) => {
                            warn!(store = %name, error = %e, "Failed to delete stale cache store");
                            report.failed.push(name);
                        }
                    }
                }
            }
            Err(e) => warn!(error = %e, "Failed to list cache stores"),
        }

        match self.clients.claim().await {
            Ok(count) => report.clients_claimed = count,
            Err(e) => warn!(error = %e, "Failed to claim clients"),
        }
        report
    }
}
