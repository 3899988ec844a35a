use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ProxyResult;
use crate::http::Response;

/// A value together with the time it was written.
///
/// `cached_at` is only informational; nothing in the proxy treats an
/// entry as stale because of its age.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        let now = Utc::now();
        (now - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            if minutes % 60 >= 30 {
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            if (minutes % 1440) / 60 >= 12 {
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }
}

/// Summary of one stored entry, for listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryInfo {
    pub key: String,
    pub status: u16,
    pub size: u64,
}

/// Storage seam for named cache stores.
///
/// Each call is atomic for a single entry; concurrent puts for the same
/// key are last-write-wins.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Create the store if it does not exist yet
    async fn open(&self, name: &str) -> ProxyResult<()>;

    /// Names of all existing stores, sorted
    async fn keys(&self) -> ProxyResult<Vec<String>>;

    /// Remove a store and every entry in it. Returns false if it was absent.
    async fn delete(&self, name: &str) -> ProxyResult<bool>;

    /// Look up an entry. A missing store is a miss, not an error.
    async fn get(&self, store: &str, key: &str) -> ProxyResult<Option<Response>>;

    /// Insert or overwrite an entry, creating the store if needed
    async fn put(&self, store: &str, key: &str, response: Response) -> ProxyResult<()>;

    /// List entries of a store, sorted by key
    async fn entries(&self, store: &str) -> ProxyResult<Vec<CachedData<EntryInfo>>>;
}
