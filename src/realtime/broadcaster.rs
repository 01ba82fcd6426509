use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

/// Serialized event as sent to sockets. Shared so each receiver clones a
/// pointer, not the payload.
pub type BroadcastMessage = Arc<str>;

/// Per-tenant broadcast groups for the real-time channel.
#[derive(Clone)]
pub struct TenantBroadcaster {
    inner: Arc<RwLock<HashMap<Uuid, TenantChannel>>>,
    capacity: usize,
}

struct TenantChannel {
    sender: broadcast::Sender<BroadcastMessage>,
    subscriber_count: usize,
}

impl TenantBroadcaster {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    /// Join the group of `tenant_id`, creating it on first use.
    pub async fn subscribe(&self, tenant_id: Uuid) -> broadcast::Receiver<BroadcastMessage> {
        let mut channels = self.inner.write().await;

        let channel = channels.entry(tenant_id).or_insert_with(|| {
            let (sender, _) = broadcast::channel(self.capacity);
            tracing::info!("Created broadcast group for tenant {}", tenant_id);
            TenantChannel {
                sender,
                subscriber_count: 0,
            }
        });

        channel.subscriber_count += 1;
        tracing::debug!(
            "Socket joined tenant {} ({} subscribers)",
            tenant_id,
            channel.subscriber_count
        );

        channel.sender.subscribe()
    }

    /// Leave the group; the group is dropped with its last subscriber.
    pub async fn unsubscribe(&self, tenant_id: Uuid) {
        let mut channels = self.inner.write().await;

        if let Some(channel) = channels.get_mut(&tenant_id) {
            channel.subscriber_count = channel.subscriber_count.saturating_sub(1);

            if channel.subscriber_count == 0 {
                channels.remove(&tenant_id);
                tracing::info!("Removed empty broadcast group for tenant {}", tenant_id);
            }
        }
    }

    /// Send to every socket of one tenant. Returns how many receivers got it.
    pub async fn broadcast(&self, tenant_id: Uuid, message: BroadcastMessage) -> usize {
        let channels = self.inner.read().await;

        match channels.get(&tenant_id) {
            // Err only means nobody is listening right now
            Some(channel) => channel.sender.send(message).unwrap_or(0),
            None => 0,
        }
    }

    pub async fn subscriber_count(&self, tenant_id: Uuid) -> usize {
        self.inner
            .read()
            .await
            .get(&tenant_id)
            .map(|c| c.subscriber_count)
            .unwrap_or(0)
    }

    pub async fn group_count(&self) -> usize {
        self.inner.read().await.len()
    }
}
