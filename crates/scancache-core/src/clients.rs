//! Application instances controlled by the proxy.
//!
//! The host owns client membership. The proxy only enumerates controlled
//! clients, posts them messages, and claims every open client when a new
//! version activates.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use crate::error::{ProxyError, ProxyResult};

/// Buffer size for each client's message channel
const CHANNEL_BUFFER_SIZE: usize = 16;

/// Messages posted to application instances.
///
/// Serializes as `{"type":"SYNC_LEADS"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    /// Check the offline leads queue now
    SyncLeads,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub id: u64,
    pub url: String,
}

#[async_trait]
pub trait ClientRegistry: Send + Sync {
    /// Clients currently controlled by this proxy
    async fn match_all(&self) -> Vec<ClientInfo>;

    /// Deliver a message without waiting for the client to read it
    async fn post_message(&self, client: &ClientInfo, message: &ClientMessage) -> ProxyResult<()>;

    /// Take control of every open client. Returns how many were claimed.
    async fn claim(&self) -> ProxyResult<usize>;
}

struct ClientSlot {
    url: String,
    controlled: bool,
    tx: mpsc::Sender<ClientMessage>,
}

#[derive(Default)]
struct RegistryState {
    next_id: u64,
    claimed: bool,
    clients: BTreeMap<u64, ClientSlot>,
}

/// In-process registry where each client is an mpsc receiver.
///
/// Clients connected before a claim start uncontrolled; once the proxy
/// has claimed, new clients are controlled from the start.
#[derive(Default)]
pub struct ChannelClients {
    state: Mutex<RegistryState>,
}

/// The client side of a connection
pub struct ClientConnection {
    pub info: ClientInfo,
    pub messages: mpsc::Receiver<ClientMessage>,
}

impl ChannelClients {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn connect(&self, url: impl Into<String>) -> ClientConnection {
        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        let mut state = self.state.lock().await;
        let id = state.next_id;
        state.next_id += 1;
        let url = url.into();
        let controlled = state.claimed;
        state.clients.insert(
            id,
            ClientSlot {
                url: url.clone(),
                controlled,
                tx,
            },
        );
        ClientConnection {
            info: ClientInfo { id, url },
            messages: rx,
        }
    }

    pub async fn disconnect(&self, id: u64) -> bool {
        self.state.lock().await.clients.remove(&id).is_some()
    }

    pub async fn is_controlled(&self, id: u64) -> bool {
        self.state
            .lock()
            .await
            .clients
            .get(&id)
            .map(|c| c.controlled)
            .unwrap_or(false)
    }
}

#[async_trait]
impl ClientRegistry for ChannelClients {
    async fn match_all(&self) -> Vec<ClientInfo> {
        self.state
            .lock()
            .await
            .clients
            .iter()
            .filter(|(_, slot)| slot.controlled)
            .map(|(id, slot)| ClientInfo {
                id: *id,
                url: slot.url.clone(),
            })
            .collect()
    }

    async fn post_message(&self, client: &ClientInfo, message: &ClientMessage) -> ProxyResult<()> {
        let state = self.state.lock().await;
        let slot = state
            .clients
            .get(&client.id)
            .ok_or(ProxyError::ClientGone(client.id))?;
        slot.tx.try_send(message.clone()).map_err(|e| {
            debug!(client = client.id, error = %e, "Message not delivered");
            match e {
                TrySendError::Full(_) => ProxyError::ClientBusy(client.id),
                TrySendError::Closed(_) => ProxyError::ClientGone(client.id),
            }
        })
    }

    async fn claim(&self) -> ProxyResult<usize> {
        let mut state = self.state.lock().await;
        state.claimed = true;
        let mut claimed = 0;
        for slot in state.clients.values_mut() {
            if !slot.controlled {
                slot.controlled = true;
                claimed += 1;
            }
        }
        Ok(claimed)
    }
}
