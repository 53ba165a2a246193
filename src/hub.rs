//! Publish/subscribe hub fanning live events out to stream sessions.
//!
//! Each subscriber owns a bounded flume queue. Publishing never blocks:
//! a full queue loses its single oldest pending message to make room for
//! the new one, and a queue that is still full after that (a consumer
//! raced us) is skipped for this message. Recency beats completeness on a
//! live feed; history is already covered by the snapshot replay.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::trace;

use crate::models::StreamMessage;

/// Pending messages allowed per subscriber before drop-oldest kicks in.
pub const SUBSCRIBER_QUEUE_CAPACITY: usize = 512;

pub type SubscriberId = u64;

struct SubscriberQueue {
    tx: flume::Sender<StreamMessage>,
    /// Second receiver on the same queue; lets publish pop the oldest
    /// pending message without touching the subscriber's receiver.
    drain: flume::Receiver<StreamMessage>,
}

/// Registry of subscriber queues. Cheap to share; membership changes hold
/// a short lock, per-queue delivery does not.
pub struct BroadcastHub {
    subscribers: Mutex<HashMap<SubscriberId, SubscriberQueue>>,
    next_id: AtomicU64,
}

impl BroadcastHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            subscribers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        })
    }

    /// Register a new bounded queue and return its receiving handle.
    ///
    /// The handle unsubscribes itself on drop, so a session that dies on
    /// any path still leaves the registry clean.
    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = flume::bounded(SUBSCRIBER_QUEUE_CAPACITY);
        let drain = rx.clone();
        self.subscribers
            .lock()
            .unwrap()
            .insert(id, SubscriberQueue { tx, drain });
        trace!(subscriber = id, "stream subscriber registered");
        Subscription {
            id,
            rx,
            hub: Arc::clone(self),
        }
    }

    /// Remove a subscriber queue. Removing an unknown id is a no-op.
    pub fn unsubscribe(&self, id: SubscriberId) {
        if self.subscribers.lock().unwrap().remove(&id).is_some() {
            trace!(subscriber = id, "stream subscriber removed");
        }
    }

    /// Deliver a message to every currently registered subscriber,
    /// best-effort and non-blocking.
    pub fn publish(&self, message: &StreamMessage) {
        // Snapshot the registry so delivery never iterates a structure a
        // concurrent subscribe/unsubscribe is mutating.
        let targets: Vec<(SubscriberId, flume::Sender<StreamMessage>, flume::Receiver<StreamMessage>)> = {
            let subscribers = self.subscribers.lock().unwrap();
            subscribers
                .iter()
                .map(|(id, queue)| (*id, queue.tx.clone(), queue.drain.clone()))
                .collect()
        };

        for (id, tx, drain) in targets {
            match tx.try_send(message.clone()) {
                Ok(()) => {}
                Err(flume::TrySendError::Full(message)) => {
                    // Drop the oldest pending message, then retry once.
                    let _ = drain.try_recv();
                    if tx.try_send(message).is_err() {
                        trace!(subscriber = id, "subscriber queue still full, skipping message");
                        metrics::counter!("stream.publish.skipped").increment(1);
                    } else {
                        metrics::counter!("stream.publish.dropped_oldest").increment(1);
                    }
                }
                Err(flume::TrySendError::Disconnected(_)) => {
                    // Subscriber went away between snapshot and delivery.
                }
            }
        }
    }

    /// Number of currently registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }
}

/// A registered subscriber's receiving end.
pub struct Subscription {
    id: SubscriberId,
    rx: flume::Receiver<StreamMessage>,
    hub: Arc<BroadcastHub>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Await the next live message. Errors only if the hub side of the
    /// queue is gone, which a session treats as end-of-stream.
    pub async fn recv(&self) -> Result<StreamMessage, flume::RecvError> {
        self.rx.recv_async().await
    }

    pub fn try_recv(&self) -> Result<StreamMessage, flume::TryRecvError> {
        self.rx.try_recv()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.unsubscribe(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MessageKind, PacketEvent};

    fn message(n: usize) -> StreamMessage {
        StreamMessage {
            kind: MessageKind::Packet,
            payload: serde_json::json!({ "seq": n }),
        }
    }

    #[tokio::test]
    async fn test_publish_delivers_to_subscriber() {
        let hub = BroadcastHub::new();
        let subscription = hub.subscribe();

        let packet = PacketEvent {
            source_callsign: Some("TEST-1".to_string()),
            ..Default::default()
        };
        hub.publish(&StreamMessage::packet(&packet));

        let received = subscription.recv().await.unwrap();
        assert_eq!(received.kind, MessageKind::Packet);
        assert_eq!(received.payload["source_callsign"], "TEST-1");
    }

    #[tokio::test]
    async fn test_full_queue_drops_oldest() {
        let hub = BroadcastHub::new();
        let subscription = hub.subscribe();

        for n in 0..SUBSCRIBER_QUEUE_CAPACITY {
            hub.publish(&message(n));
        }
        // Queue is full: this delivery must evict message 0.
        hub.publish(&message(SUBSCRIBER_QUEUE_CAPACITY));

        let first = subscription.try_recv().unwrap();
        assert_eq!(first.payload["seq"], 1);

        let mut last = first;
        while let Ok(next) = subscription.try_recv() {
            last = next;
        }
        assert_eq!(last.payload["seq"], SUBSCRIBER_QUEUE_CAPACITY);
    }

    #[tokio::test]
    async fn test_full_queue_does_not_disturb_other_subscribers() {
        let hub = BroadcastHub::new();
        let full = hub.subscribe();
        let healthy = hub.subscribe();

        for n in 0..SUBSCRIBER_QUEUE_CAPACITY {
            hub.publish(&message(n));
        }
        // Drain the healthy subscriber so only `full` is at capacity.
        while healthy.try_recv().is_ok() {}

        hub.publish(&message(9999));

        let delivered = healthy.try_recv().unwrap();
        assert_eq!(delivered.payload["seq"], 9999);
        assert_eq!(full.try_recv().unwrap().payload["seq"], 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_is_idempotent_and_stops_delivery() {
        let hub = BroadcastHub::new();
        let subscription = hub.subscribe();
        let id = subscription.id();

        hub.unsubscribe(id);
        hub.unsubscribe(id);
        assert_eq!(hub.subscriber_count(), 0);

        hub.publish(&message(1));
        assert!(subscription.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dropping_subscription_unsubscribes() {
        let hub = BroadcastHub::new();
        let subscription = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 1);
        drop(subscription);
        assert_eq!(hub.subscriber_count(), 0);
    }
}
