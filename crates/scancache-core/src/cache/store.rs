use std::sync::Arc;

use futures::future::join_all;
use reqwest::{Method, Url};

use super::storage::CacheStorage;
use crate::error::{ProxyError, ProxyResult};
use crate::http::{Request, Response};
use crate::network::Network;

/// Handle to one named cache store. Clone is cheap.
#[derive(Clone)]
pub struct CacheStore {
    name: String,
    storage: Arc<dyn CacheStorage>,
}

impl CacheStore {
    /// Bind to a store without creating it
    pub fn bind(storage: Arc<dyn CacheStorage>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            storage,
        }
    }

    /// Bind to a store, creating it if absent
    pub async fn open(storage: Arc<dyn CacheStorage>, name: impl Into<String>) -> ProxyResult<Self> {
        let store = Self::bind(storage, name);
        store.storage.open(&store.name).await?;
        Ok(store)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up a request. Only GET identities are ever stored, so any
    /// other method is always a miss.
    pub async fn match_request(&self, request: &Request) -> ProxyResult<Option<Response>> {
        if request.method != Method::GET {
            return Ok(None);
        }
        self.storage.get(&self.name, &request.identity()).await
    }

    pub async fn match_url(&self, url: &Url) -> ProxyResult<Option<Response>> {
        self.match_request(&Request::new(Method::GET, url.clone()))
            .await
    }

    /// Store a response under the request's identity, replacing any
    /// previous entry
    pub async fn put(&self, request: &Request, response: Response) -> ProxyResult<()> {
        self.storage
            .put(&self.name, &request.identity(), response)
            .await
    }

    /// Fetch every URL and store all of them, or none.
    ///
    /// Fails on the first network error or non-ok status; nothing is
    /// written unless every fetch succeeded. Returns the number of entries
    /// written.
    pub async fn add_all(&self, urls: &[Url], network: &dyn Network) -> ProxyResult<usize> {
        let requests: Vec<Request> = urls
            .iter()
            .map(|url| Request::new(Method::GET, url.clone()))
            .collect();

        let results = join_all(requests.iter().map(|r| network.fetch(r))).await;

        let mut fetched = Vec::with_capacity(results.len());
        for (request, result) in requests.iter().zip(results) {
            let response = result?;
            if !response.is_ok() {
                return Err(ProxyError::bad_status(request.url.as_str(), response.status()));
            }
            fetched.push((request, response));
        }

        let count = fetched.len();
        let writes = join_all(
            fetched
                .into_iter()
                .map(|(request, response)| self.put(request, response)),
        )
        .await;
        writes.into_iter().collect::<ProxyResult<Vec<()>>>()?;
        Ok(count)
    }
}
