use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info};
use uuid::Uuid;

use super::envelope::EventEnvelope;

/// A wire-encoded envelope shared by every queue it was fanned out to.
pub type Message = Arc<str>;

/// Opaque subscriber handle; identity is by handle, never by queue content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Set of open event-stream connections and the fan-out over them.
///
/// Each subscriber owns an unbounded FIFO queue. Publishing only pushes onto
/// those queues, so a slow connection can never stall the publisher; the
/// actual transmission happens in each connection's pump loop.
#[derive(Clone, Default)]
pub struct Broadcaster {
    subscribers: Arc<DashMap<SubscriberId, UnboundedSender<Message>>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new subscriber with an empty queue.
    pub fn subscribe(&self) -> Subscription {
        let (sender, queue) = mpsc::unbounded_channel();
        let id = SubscriberId::new();

        self.subscribers.insert(id.clone(), sender);
        info!(subscriber = %id, total = self.subscribers.len(), "Registered event subscriber");

        Subscription {
            id,
            queue,
            registry: self.clone(),
        }
    }

    /// Removes a subscriber. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: &SubscriberId) -> bool {
        let removed = self.subscribers.remove(id).is_some();
        if removed {
            info!(subscriber = %id, total = self.subscribers.len(), "Unregistered event subscriber");
        }
        removed
    }

    /// Enqueues the encoded envelope for every registered subscriber and
    /// returns how many copies were queued. Never waits on a consumer.
    pub fn publish(&self, envelope: &EventEnvelope) -> usize {
        let message: Message = Arc::from(envelope.encode());
        let mut delivered = 0;
        let mut dead = Vec::new();

        for entry in self.subscribers.iter() {
            match entry.value().send(Arc::clone(&message)) {
                Ok(()) => delivered += 1,
                Err(_) => dead.push(entry.key().clone()),
            }
        }

        // Removal must wait until the shard read guards above are released
        for id in dead {
            debug!(subscriber = %id, "Dropping subscriber with closed queue");
            self.subscribers.remove(&id);
        }

        debug!(kind = %envelope.kind(), delivered, "Published event");
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

/// Receiving end of one subscriber's queue.
///
/// Dropping it deregisters the subscriber, so teardown always leaves the
/// active set no matter how the connection ended.
pub struct Subscription {
    id: SubscriberId,
    queue: UnboundedReceiver<Message>,
    registry: Broadcaster,
}

impl Subscription {
    pub fn id(&self) -> &SubscriberId {
        &self.id
    }

    /// Waits for the next queued message. `None` means the subscriber was
    /// removed from the registry and nothing more will arrive.
    pub async fn next(&mut self) -> Option<Message> {
        self.queue.recv().await
    }

    /// Takes every message queued right now, in publish order.
    pub fn drain(&mut self) -> Vec<Message> {
        let mut messages = Vec::new();
        while let Ok(message) = self.queue.try_recv() {
            messages.push(message);
        }
        messages
    }

    /// Deregisters now instead of on drop.
    pub fn close(&mut self) {
        self.registry.unsubscribe(&self.id);
        self.queue.close();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry.unsubscribe(&self.id);
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
