use std::sync::Arc;

use tracing::{debug, info};

use crate::clients::{ClientMessage, ClientRegistry};
use crate::config::ProxyConfig;

/// Wakes application instances when background sync fires for the
/// offline leads queue. Holds no queue state of its own.
pub struct ReconnectionNotifier {
    config: Arc<ProxyConfig>,
    clients: Arc<dyn ClientRegistry>,
}

impl ReconnectionNotifier {
    pub fn new(config: Arc<ProxyConfig>, clients: Arc<dyn ClientRegistry>) -> Self {
        Self { config, clients }
    }

    /// Handle a sync event. Returns how many clients were handed the
    /// message; tags other than the configured one are ignored.
    pub async fn sync(&self, tag: &str) -> usize {
        if tag != self.config.sync_tag {
            debug!(tag = tag, "Ignoring unrelated sync tag");
            return 0;
        }

        let message = ClientMessage::SyncLeads;
        let mut delivered = 0;
        for client in self.clients.match_all().await {
            match self.clients.post_message(&client, &message).await {
                Ok(()) => delivered += 1,
                Err(e) => debug!(client = client.id, error = %e, "Sync notification dropped"),
            }
        }
        info!(tag = tag, clients = delivered, "Broadcast sync notification");
        delivered
    }
}
