//! Versioned response cache.
//!
//! Responses are kept in named stores, one per deployed version
//! (e.g. `card-scanner-v1`). Entries are keyed by request identity and
//! never expire by age; a whole store is dropped when a newer version
//! activates.
//!
//! - `CacheStorage`: the storage seam (list, open, delete stores; get and
//!   put entries)
//! - `MemoryStorage`: in-process backend
//! - `DiskStorage`: one directory per store, two files per entry
//! - `CacheStore`: a handle bound to one store name

pub mod disk;
pub mod memory;
pub mod storage;
pub mod store;

pub use disk::DiskStorage;
pub use memory::MemoryStorage;
pub use storage::{CacheStorage, CachedData, EntryInfo};
pub use store::CacheStore;
