//! scancache-core - offline caching proxy for the card scanner app.
//!
//! Sits between the page and the network:
//!
//! - `bootstrap`: precaches the asset manifest and remote libraries on install
//! - `generation`: deletes caches of older versions on activate
//! - `router`: answers requests cache-first with network fallback
//! - `notifier`: tells app instances to flush their offline queue on sync
//!
//! `OfflineWorker` wires them together behind the host's four events.

pub mod bootstrap;
pub mod cache;
pub mod clients;
pub mod config;
pub mod error;
pub mod generation;
pub mod http;
pub mod network;
pub mod notifier;
pub mod router;
pub mod worker;

pub use bootstrap::{Bootstrapper, InstallReport};
pub use cache::{CacheStorage, CacheStore, CachedData, DiskStorage, EntryInfo, MemoryStorage};
pub use clients::{ChannelClients, ClientConnection, ClientInfo, ClientMessage, ClientRegistry};
pub use config::ProxyConfig;
pub use error::{ProxyError, ProxyResult};
pub use generation::{ActivationReport, GenerationManager};
pub use http::{Request, RequestMode, Response, ResponseHead};
pub use network::{HttpNetwork, Network};
pub use notifier::ReconnectionNotifier;
pub use router::{FetchDecision, RequestRouter};
pub use worker::{OfflineWorker, WorkerEvent, WorkerOutcome, WorkerState};

// Re-exported so embedders can build requests without naming reqwest
pub use reqwest::{Method, Url};
