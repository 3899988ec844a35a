//! Per-request routing: passthrough, cache-first, network fallback.
//!
//! Order of checks for every intercepted request:
//!
//! 1. non-GET methods pass through untouched
//! 2. hosts matching a bypass domain pass through untouched
//! 3. cache hit is returned as is
//! 4. on a miss the network is tried; a 200 is written back
//! 5. if the network fails, navigations get the cached fallback document
//!    and everything else gets a synthesized 503

use std::sync::Arc;

use reqwest::Method;
use tracing::{debug, warn};

use crate::cache::{CacheStorage, CacheStore};
use crate::config::ProxyConfig;
use crate::http::{Request, Response};
use crate::network::Network;

/// What the host should do with an intercepted request
#[derive(Debug, PartialEq, Eq)]
pub enum FetchDecision {
    /// Not intercepted; the host sends the request to the network itself
    Passthrough,
    Respond(Response),
}

impl FetchDecision {
    pub fn is_passthrough(&self) -> bool {
        matches!(self, FetchDecision::Passthrough)
    }

    pub fn into_response(self) -> Option<Response> {
        match self {
            FetchDecision::Passthrough => None,
            FetchDecision::Respond(response) => Some(response),
        }
    }
}

pub struct RequestRouter {
    config: Arc<ProxyConfig>,
    store: CacheStore,
    network: Arc<dyn Network>,
}

impl RequestRouter {
    pub fn new(
        config: Arc<ProxyConfig>,
        storage: Arc<dyn CacheStorage>,
        network: Arc<dyn Network>,
    ) -> Self {
        let store = CacheStore::bind(storage, config.cache_name());
        Self {
            config,
            store,
            network,
        }
    }

    /// True if this request is never intercepted
    pub fn passes_through(&self, request: &Request) -> bool {
        request.method != Method::GET
            || request
                .host()
                .map(|host| self.config.is_bypassed(host))
                .unwrap_or(false)
    }

    pub async fn fetch(&self, request: &Request) -> FetchDecision {
        if self.passes_through(request) {
            debug!(request = %request, "Passing through");
            return FetchDecision::Passthrough;
        }
        FetchDecision::Respond(self.cache_first(request).await)
    }

    async fn cache_first(&self, request: &Request) -> Response {
        match self.store.match_request(request).await {
            Ok(Some(cached)) => {
                debug!(request = %request, "Cache hit");
                return cached;
            }
            Ok(None) => {}
            Err(e) => warn!(request = %request, error = %e, "Cache lookup failed, treating as miss"),
        }

        match self.network.fetch(request).await {
            Ok(response) if response.status() == 200 => {
                let (response, copy) = response.tee();
                if let Err(e) = self.store.put(request, copy).await {
                    warn!(request = %request, error = %e, "Failed to write response to cache");
                }
                response
            }
            Ok(response) => {
                debug!(request = %request, status = response.status(), "Not caching response");
                response
            }
            Err(e) => {
                debug!(request = %request, error = %e, "Network unavailable");
                self.offline_fallback(request).await
            }
        }
    }

    async fn offline_fallback(&self, request: &Request) -> Response {
        if request.is_navigation() {
            match self.config.resolve(&self.config.fallback_document) {
                Ok(url) => match self.store.match_url(&url).await {
                    Ok(Some(page)) => return page,
                    Ok(None) => debug!(url = %url, "Fallback document not cached"),
                    Err(e) => warn!(url = %url, error = %e, "Fallback document lookup failed"),
                },
                Err(e) => warn!(error = %e, "Invalid fallback document"),
            }
        }
        Response::offline()
    }
}
