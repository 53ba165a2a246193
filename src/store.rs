//! Retention-bounded in-memory storage for packets and RSSI samples.
//!
//! Two independent histories plus a derived last-seen-per-callsign index.
//! Every insert runs two eviction passes: an age pass against the
//! retention window, then a capacity pass against `max_items`. The passes
//! are independent — a fresh item can still be evicted for being over
//! capacity. Eviction is irreversible; evicted events are gone.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use anyhow::{Result, bail};
use chrono::{DateTime, Duration, Utc};

use crate::models::{EffectiveTimestamp, PacketEvent, RssiSample, StreamMessage};

/// Current sizes of both histories and the station index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreCounts {
    pub packets: usize,
    pub rssi_samples: usize,
    pub stations_tracked: usize,
}

struct StoreInner {
    packets: VecDeque<PacketEvent>,
    rssi: VecDeque<RssiSample>,
    last_seen: HashMap<String, PacketEvent>,
}

/// Retention-limited storage shared by the ingest, query, and stream paths.
///
/// The two histories and the index are one unit of shared state: the index
/// derives from the packet history and must never be observed mid-update,
/// so every operation takes the single interior mutex. No critical section
/// awaits or performs I/O.
pub struct RetentionStore {
    retention: Duration,
    max_items: usize,
    inner: Mutex<StoreInner>,
}

impl RetentionStore {
    /// Build a store. Rejects a non-positive retention window or capacity.
    pub fn new(retention: Duration, max_items: usize) -> Result<Self> {
        if retention <= Duration::zero() {
            bail!("retention window must be positive, got {}s", retention.num_seconds());
        }
        if max_items == 0 {
            bail!("max_items must be at least 1");
        }
        Ok(Self {
            retention,
            max_items,
            inner: Mutex::new(StoreInner {
                packets: VecDeque::new(),
                rssi: VecDeque::new(),
                last_seen: HashMap::new(),
            }),
        })
    }

    /// Append a packet, refresh the last-seen index for its source
    /// callsign, then evict and prune against the current cutoff.
    pub fn insert_packet(&self, packet: PacketEvent) {
        let now = Utc::now();
        let cutoff = now - self.retention;
        let mut inner = self.inner.lock().unwrap();
        if let Some(callsign) = packet.source_callsign.clone() {
            inner.last_seen.insert(callsign, packet.clone());
        }
        inner.packets.push_back(packet);
        trim(&mut inner.packets, cutoff, self.max_items, now);
        inner
            .last_seen
            .retain(|_, packet| packet.effective_timestamp(now) >= cutoff);
    }

    /// Append an RSSI sample and evict that history only.
    pub fn insert_rssi(&self, sample: RssiSample) {
        let now = Utc::now();
        let cutoff = now - self.retention;
        let mut inner = self.inner.lock().unwrap();
        inner.rssi.push_back(sample);
        trim(&mut inner.rssi, cutoff, self.max_items, now);
    }

    /// Point-in-time copy of the packet history, insertion order.
    pub fn recent_packets(&self) -> Vec<PacketEvent> {
        let inner = self.inner.lock().unwrap();
        inner.packets.iter().cloned().collect()
    }

    /// Point-in-time copy of the RSSI history, insertion order.
    pub fn recent_samples(&self) -> Vec<RssiSample> {
        let inner = self.inner.lock().unwrap();
        inner.rssi.iter().cloned().collect()
    }

    /// Point-in-time copy of the last-seen index.
    pub fn last_seen(&self) -> HashMap<String, PacketEvent> {
        let inner = self.inner.lock().unwrap();
        inner.last_seen.clone()
    }

    /// Stations whose most recent packet is at or after `cutoff`.
    pub fn stations_since(&self, cutoff: DateTime<Utc>) -> HashMap<String, PacketEvent> {
        let now = Utc::now();
        let inner = self.inner.lock().unwrap();
        inner
            .last_seen
            .iter()
            .filter(|(_, packet)| packet.effective_timestamp(now) >= cutoff)
            .map(|(callsign, packet)| (callsign.clone(), packet.clone()))
            .collect()
    }

    /// All retained events merged ascending by effective timestamp and
    /// wrapped as stream messages, for replay to a new subscriber.
    ///
    /// The copy is taken under the lock; sorting and serialization happen
    /// outside it.
    pub fn snapshot_ordered(&self) -> Vec<StreamMessage> {
        let now = Utc::now();
        let (packets, rssi) = {
            let inner = self.inner.lock().unwrap();
            (inner.packets.clone(), inner.rssi.clone())
        };

        let mut entries: Vec<(DateTime<Utc>, StreamMessage)> =
            Vec::with_capacity(packets.len() + rssi.len());
        for packet in &packets {
            entries.push((packet.effective_timestamp(now), StreamMessage::packet(packet)));
        }
        for sample in &rssi {
            entries.push((sample.effective_timestamp(now), StreamMessage::rssi(sample)));
        }
        // Stable sort keeps insertion order on equal timestamps.
        entries.sort_by_key(|(timestamp, _)| *timestamp);
        entries.into_iter().map(|(_, message)| message).collect()
    }

    /// Sizes of both histories and the index, for stats reporting.
    pub fn counts(&self) -> StoreCounts {
        let inner = self.inner.lock().unwrap();
        StoreCounts {
            packets: inner.packets.len(),
            rssi_samples: inner.rssi.len(),
            stations_tracked: inner.last_seen.len(),
        }
    }
}

/// Age pass, then capacity pass. Only ever removes from the oldest end.
fn trim<T: EffectiveTimestamp>(
    history: &mut VecDeque<T>,
    cutoff: DateTime<Utc>,
    max_items: usize,
    now: DateTime<Utc>,
) {
    while let Some(oldest) = history.front() {
        if oldest.effective_timestamp(now) >= cutoff {
            break;
        }
        history.pop_front();
    }
    while history.len() > max_items {
        history.pop_front();
    }
}
