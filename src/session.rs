//! Per-connection stream session: replay history, then tail live events.
//!
//! A session moves through three phases, never backwards:
//! replaying the history snapshot, forwarding live hub messages with
//! heartbeats filling the gaps, and closed. The hub subscription is taken
//! *before* the snapshot is captured, so an event landing between the two
//! can be delivered twice (once from replay, once live) but is never
//! lost; consumers that care can de-duplicate by timestamp. Dropping the
//! session — which axum does the instant the client disconnects —
//! unsubscribes exactly once via the subscription guard.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::debug;

use crate::hub::{BroadcastHub, Subscription};
use crate::models::StreamMessage;
use crate::store::RetentionStore;

enum Phase {
    Replaying(VecDeque<StreamMessage>),
    Live,
}

pub struct StreamSession {
    phase: Phase,
    subscription: Subscription,
    heartbeat_interval: Duration,
}

impl StreamSession {
    /// Subscribe to the hub, capture the history snapshot, and start in
    /// the replay phase.
    pub fn open(
        store: &RetentionStore,
        hub: &Arc<BroadcastHub>,
        heartbeat_interval: Duration,
    ) -> Self {
        let subscription = hub.subscribe();
        let replay: VecDeque<StreamMessage> = store.snapshot_ordered().into();
        debug!(
            subscriber = subscription.id(),
            replay_messages = replay.len(),
            "stream session opened"
        );
        Self {
            phase: Phase::Replaying(replay),
            subscription,
            heartbeat_interval,
        }
    }

    /// Next message to emit, or `None` once the hub side of the queue is
    /// gone and the session is closed.
    ///
    /// Replay messages come out first, in snapshot order. After the last
    /// one the session switches to live: hub messages in publish order,
    /// with a synthesized heartbeat whenever a full heartbeat interval
    /// passes without traffic.
    pub async fn next_message(&mut self) -> Option<StreamMessage> {
        if let Phase::Replaying(replay) = &mut self.phase {
            if let Some(message) = replay.pop_front() {
                return Some(message);
            }
            self.phase = Phase::Live;
        }

        match tokio::time::timeout(self.heartbeat_interval, self.subscription.recv()).await {
            Ok(Ok(message)) => Some(message),
            Ok(Err(_)) => {
                debug!(subscriber = self.subscription.id(), "stream session closed");
                None
            }
            Err(_elapsed) => Some(StreamMessage::heartbeat(Utc::now())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MessageKind, PacketEvent, RssiSample};
    use chrono::Duration as ChronoDuration;

    fn packet(callsign: &str, seconds_ago: i64) -> PacketEvent {
        PacketEvent {
            source_callsign: Some(callsign.to_string()),
            timestamp: Some(Utc::now() - ChronoDuration::seconds(seconds_ago)),
            ..Default::default()
        }
    }

    fn test_store() -> RetentionStore {
        RetentionStore::new(ChronoDuration::seconds(3600), 100).unwrap()
    }

    #[tokio::test]
    async fn test_replays_snapshot_before_live_messages() {
        let store = test_store();
        let hub = BroadcastHub::new();
        store.insert_packet(packet("FIRST", 60));
        store.insert_packet(packet("SECOND", 30));

        let mut session = StreamSession::open(&store, &hub, Duration::from_secs(30));

        let live = PacketEvent {
            source_callsign: Some("LIVE".to_string()),
            ..Default::default()
        };
        hub.publish(&StreamMessage::packet(&live));

        let callsigns: Vec<String> = [
            session.next_message().await.unwrap(),
            session.next_message().await.unwrap(),
            session.next_message().await.unwrap(),
        ]
        .iter()
        .map(|m| m.payload["source_callsign"].as_str().unwrap().to_string())
        .collect();
        assert_eq!(callsigns, vec!["FIRST", "SECOND", "LIVE"]);
    }

    #[tokio::test]
    async fn test_emits_heartbeat_when_idle() {
        let store = test_store();
        let hub = BroadcastHub::new();
        let mut session = StreamSession::open(&store, &hub, Duration::from_millis(20));

        let message = session.next_message().await.unwrap();
        assert_eq!(message.kind, MessageKind::Heartbeat);
        assert!(message.payload["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_replay_covers_both_histories_in_order() {
        let store = test_store();
        let hub = BroadcastHub::new();
        store.insert_rssi(RssiSample {
            timestamp: Some(Utc::now() - ChronoDuration::seconds(45)),
            dbm: -70.0,
            frequency_mhz: 144.39,
            integration_ms: None,
            metadata: None,
        });
        store.insert_packet(packet("MID", 20));

        let mut session = StreamSession::open(&store, &hub, Duration::from_secs(30));
        let first = session.next_message().await.unwrap();
        let second = session.next_message().await.unwrap();
        assert_eq!(first.kind, MessageKind::Rssi);
        assert_eq!(second.kind, MessageKind::Packet);
    }

    #[tokio::test]
    async fn test_drop_releases_hub_subscription() {
        let store = test_store();
        let hub = BroadcastHub::new();
        let session = StreamSession::open(&store, &hub, Duration::from_secs(30));
        assert_eq!(hub.subscriber_count(), 1);
        drop(session);
        assert_eq!(hub.subscriber_count(), 0);
    }
}
