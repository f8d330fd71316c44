use std::sync::Arc;
use std::fmt;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;
use trellis_core::ChangeListener;
use uuid::Uuid;

use crate::infra::websocket::messages::TopologyEvent;

/// Per-connection outbox depth. A viewer that cannot drain this many
/// events is treated as gone.
const SUBSCRIBER_QUEUE: usize = 32;

struct Subscriber {
    sender: mpsc::Sender<TopologyEvent>,
}

/// Owns the set of live topology viewers.
///
/// Connect/disconnect and fanout may race freely; a subscriber whose
/// channel is closed or full is dropped after the fanout pass, never
/// mid-iteration.
pub struct SubscriberHub {
    subscribers: DashMap<Uuid, Subscriber>,
}

impl fmt::Debug for SubscriberHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberHub")
            .field("subscriber_count", &self.subscribers.len())
            .finish()
    }
}

impl SubscriberHub {
    pub fn new() -> Self {
        Self {
            subscribers: DashMap::new(),
        }
    }

    /// Register a new viewer, returning its id and the event stream the
    /// connection task must drain.
    pub fn subscribe(&self) -> (Uuid, mpsc::Receiver<TopologyEvent>) {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_QUEUE);
        let id = Uuid::now_v7();
        self.subscribers.insert(id, Subscriber { sender: tx });
        debug!(%id, total = self.subscribers.len(), "subscriber joined");
        (id, rx)
    }

    pub fn unsubscribe(&self, id: Uuid) {
        if self.subscribers.remove(&id).is_some() {
            debug!(%id, total = self.subscribers.len(), "subscriber left");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Deliver an event to every subscriber. Sends never block: a viewer
    /// whose outbox is full has stopped draining and is treated the same
    /// as one whose channel is closed. Senders are snapshotted first so
    /// removal never happens mid-iteration.
    pub fn broadcast(&self, event: TopologyEvent) {
        let targets: Vec<(Uuid, mpsc::Sender<TopologyEvent>)> = self
            .subscribers
            .iter()
            .map(|entry| (*entry.key(), entry.value().sender.clone()))
            .collect();

        let mut dead = Vec::new();
        for (id, sender) in targets {
            if sender.try_send(event).is_err() {
                dead.push(id);
            }
        }
        for id in dead {
            debug!(%id, "dropping unreachable subscriber");
            self.subscribers.remove(&id);
        }
    }

    pub fn notify_topology_changed(&self) {
        self.broadcast(TopologyEvent::TopologyChanged);
    }
}

impl Default for SubscriberHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Adapts the hub to the pipeline's change-listener seam. Fanout is
/// non-blocking, so ingestion never waits on delivery.
#[derive(Debug)]
pub struct HubListener(pub Arc<SubscriberHub>);

impl ChangeListener for HubListener {
    fn topology_changed(&self) {
        self.0.notify_topology_changed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn broadcast_reaches_every_subscriber() {
        let hub = SubscriberHub::new();
        let (_a, mut rx_a) = hub.subscribe();
        let (_b, mut rx_b) = hub.subscribe();

        hub.notify_topology_changed();

        assert_eq!(rx_a.recv().await, Some(TopologyEvent::TopologyChanged));
        assert_eq!(rx_b.recv().await, Some(TopologyEvent::TopologyChanged));
    }

    #[tokio::test]
    async fn dead_subscriber_is_dropped_without_aborting_fanout() {
        let hub = SubscriberHub::new();
        let (_gone, rx_gone) = hub.subscribe();
        let (_live, mut rx_live) = hub.subscribe();
        drop(rx_gone);

        hub.notify_topology_changed();

        assert_eq!(
            rx_live.recv().await,
            Some(TopologyEvent::TopologyChanged)
        );
        assert_eq!(hub.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn unsubscribe_closes_the_stream() {
        let hub = SubscriberHub::new();
        let (id, mut rx) = hub.subscribe();
        hub.unsubscribe(id);
        assert_eq!(hub.subscriber_count(), 0);
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn full_subscriber_queue_does_not_stall_fanout() {
        let hub = SubscriberHub::new();
        let (_stalled, rx_stalled) = hub.subscribe();
        let (_live, mut rx_live) = hub.subscribe();

        // Saturate the stalled viewer's outbox while the live one keeps
        // draining.
        for _ in 0..SUBSCRIBER_QUEUE {
            hub.broadcast(TopologyEvent::Ping);
            assert_eq!(rx_live.try_recv().ok(), Some(TopologyEvent::Ping));
        }

        hub.notify_topology_changed();

        assert_eq!(
            rx_live.recv().await,
            Some(TopologyEvent::TopologyChanged)
        );
        assert_eq!(hub.subscriber_count(), 1);
        drop(rx_stalled);
    }

    #[tokio::test]
    async fn listener_forwards_change_signal() {
        let hub = Arc::new(SubscriberHub::new());
        let (_id, mut rx) = hub.subscribe();

        let listener = HubListener(hub);
        listener.topology_changed();

        assert_eq!(rx.recv().await, Some(TopologyEvent::TopologyChanged));
    }
}
