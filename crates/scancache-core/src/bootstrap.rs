//! Install-time precache.
//!
//! Seeds the current cache store with the same-origin asset manifest (one
//! all-or-nothing batch) and each remote library (independently). No
//! single failure fails the install.

use std::sync::Arc;

use futures::future::{join, join_all};
use reqwest::Url;
use tracing::{info, warn};

use crate::cache::{CacheStorage, CacheStore};
use crate::config::ProxyConfig;
use crate::error::{ProxyError, ProxyResult};
use crate::http::Request;
use crate::network::Network;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub cache_name: String,
    /// Whether the asset manifest batch was stored
    pub assets_cached: bool,
    pub remote_cached: Vec<String>,
    pub remote_failed: Vec<String>,
}

pub struct Bootstrapper {
    config: Arc<ProxyConfig>,
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
}

impl Bootstrapper {
    pub fn new(
        config: Arc<ProxyConfig>,
        storage: Arc<dyn CacheStorage>,
        network: Arc<dyn Network>,
    ) -> Self {
        Self {
            config,
            storage,
            network,
        }
    }

    /// Populate the current store. Always completes.
    pub async fn install(&self) -> InstallReport {
        let cache_name = self.config.cache_name();
        let store = match CacheStore::open(self.storage.clone(), cache_name.clone()).await {
            Ok(store) => store,
            Err(e) => {
                // Puts create the store on demand, so keep going
                warn!(store = %cache_name, error = %e, "Failed to open cache store");
                CacheStore::bind(self.storage.clone(), cache_name.clone())
            }
        };

        let (assets, remotes) = join(
            self.cache_assets(&store),
            join_all(
                self.config
                    .remote_libraries
                    .iter()
                    .map(|url| self.cache_remote(&store, url)),
            ),
        )
        .await;

        let assets_cached = match assets {
            Ok(count) => {
                info!(store = %cache_name, count = count, "Cached static assets");
                true
            }
            Err(e) => {
                warn!(store = %cache_name, error = %e, "Failed to cache static assets");
                false
            }
        };

        let mut report = InstallReport {
            cache_name,
            assets_cached,
            ..Default::default()
        };
        for (url, result) in self.config.remote_libraries.iter().zip(remotes) {
            match result {
                Ok(true) => report.remote_cached.push(url.clone()),
                Ok(false) => report.remote_failed.push(url.clone()),
                Err(e) => {
                    warn!(url = %url, error = %e, "Failed to cache remote library");
                    report.remote_failed.push(url.clone());
                }
            }
        }
        report
    }

    async fn cache_assets(&self, store: &CacheStore) -> ProxyResult<usize> {
        let urls = self
            .config
            .assets
            .iter()
            .map(|path| self.config.resolve(path))
            .collect::<ProxyResult<Vec<Url>>>()?;
        store.add_all(&urls, self.network.as_ref()).await
    }

    /// Ok(false) means the fetch worked but the status was not ok
    async fn cache_remote(&self, store: &CacheStore, url: &str) -> ProxyResult<bool> {
        let request = Request::get(url)?;
        let response = self.network.fetch(&request).await?;
        if !response.is_ok() {
            let err = ProxyError::bad_status(url, response.status());
            warn!(url = %url, error = %err, "Skipping remote library");
            return Ok(false);
        }
        store.put(&request, response).await?;
        Ok(true)
    }
}
