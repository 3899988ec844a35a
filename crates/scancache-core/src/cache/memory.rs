use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::storage::{CacheStorage, CachedData, EntryInfo};
use crate::error::ProxyResult;
use crate::http::Response;

type Store = BTreeMap<String, CachedData<Response>>;

/// In-process cache storage. Contents are lost when dropped.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    stores: RwLock<HashMap<String, Store>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn open(&self, name: &str) -> ProxyResult<()> {
        self.stores
            .write()
            .await
            .entry(name.to_string())
            .or_default();
        Ok(())
    }

    async fn keys(&self) -> ProxyResult<Vec<String>> {
        let mut names: Vec<String> = self.stores.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn delete(&self, name: &str) -> ProxyResult<bool> {
        Ok(self.stores.write().await.remove(name).is_some())
    }

    async fn get(&self, store: &str, key: &str) -> ProxyResult<Option<Response>> {
        let stores = self.stores.read().await;
        Ok(stores
            .get(store)
            .and_then(|entries| entries.get(key))
            .map(|cached| cached.data.duplicate()))
    }

    async fn put(&self, store: &str, key: &str, response: Response) -> ProxyResult<()> {
        self.stores
            .write()
            .await
            .entry(store.to_string())
            .or_default()
            .insert(key.to_string(), CachedData::new(response));
        Ok(())
    }

    async fn entries(&self, store: &str) -> ProxyResult<Vec<CachedData<EntryInfo>>> {
        let stores = self.stores.read().await;
        let Some(entries) = stores.get(store) else {
            return Ok(Vec::new());
        };
        Ok(entries
            .iter()
            .map(|(key, cached)| CachedData {
                data: EntryInfo {
                    key: key.clone(),
                    status: cached.data.status(),
                    size: cached.data.body().len() as u64,
                },
                cached_at: cached.cached_at,
            })
            .collect())
    }
}
