//! Event types for APRS packets, RSSI samples, and the stream envelope.
//!
//! Packets arrive from Direwolf-adjacent tooling as loosely-shaped JSON:
//! a closed set of known fields plus whatever extra columns the producer
//! had on hand. Known fields are typed here; anything unrecognized at the
//! top level is ignored, and producers can stash raw columns in `raw_row`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Audio diagnostics attached to a demodulated packet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioInfo {
    pub raw: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mark: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub space: Option<i64>,
}

/// A single decoded APRS packet as reported by an ingest tool.
///
/// Every field except the message type is optional: different producers
/// (CSV tail, replay tooling) fill different subsets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacketEvent {
    #[serde(default = "default_message_type")]
    pub message_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Epoch-seconds fallback used when the producer has no parsed timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unix_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_callsign: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_callsign: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dti: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telemetry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tone: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_level: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_count: Option<u32>,
    /// Raw producer columns that have no typed field here.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_row: Option<serde_json::Map<String, serde_json::Value>>,
}

fn default_message_type() -> String {
    "packet".to_string()
}

impl Default for PacketEvent {
    fn default() -> Self {
        Self {
            message_type: default_message_type(),
            timestamp: None,
            unix_time: None,
            channel: None,
            source_callsign: None,
            destination_callsign: None,
            path: None,
            dti: None,
            name: None,
            symbol: None,
            system: None,
            status: None,
            telemetry: None,
            comment: None,
            latitude: None,
            longitude: None,
            speed: None,
            course: None,
            altitude: None,
            frequency: None,
            offset: None,
            tone: None,
            audio: None,
            audio_level: None,
            error_count: None,
            raw_row: None,
        }
    }
}

/// A signal-strength reading from rtl_power or a similar monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RssiSample {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Measured signal strength in dBm.
    pub dbm: f64,
    /// Center frequency the sample represents.
    pub frequency_mhz: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub integration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

/// The single timestamp used for ordering and eviction decisions.
///
/// Priority: explicit timestamp, then epoch fallback, then the wall clock
/// the caller captured for the current operation. Callers capture
/// `Utc::now()` once per store operation and thread it through so every
/// derivation within that operation is consistent.
pub trait EffectiveTimestamp {
    fn effective_timestamp(&self, fallback: DateTime<Utc>) -> DateTime<Utc>;
}

impl EffectiveTimestamp for PacketEvent {
    fn effective_timestamp(&self, fallback: DateTime<Utc>) -> DateTime<Utc> {
        if let Some(timestamp) = self.timestamp {
            return timestamp;
        }
        if let Some(unix_time) = self.unix_time
            && let Some(timestamp) = DateTime::from_timestamp(unix_time, 0)
        {
            return timestamp;
        }
        fallback
    }
}

impl EffectiveTimestamp for RssiSample {
    fn effective_timestamp(&self, fallback: DateTime<Utc>) -> DateTime<Utc> {
        self.timestamp.unwrap_or(fallback)
    }
}

/// Event name on the SSE wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Packet,
    Rssi,
    Heartbeat,
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageKind::Packet => write!(f, "packet"),
            MessageKind::Rssi => write!(f, "rssi"),
            MessageKind::Heartbeat => write!(f, "heartbeat"),
        }
    }
}

/// Envelope handed from the hub to stream sessions. Never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamMessage {
    pub kind: MessageKind,
    pub payload: serde_json::Value,
}

impl StreamMessage {
    pub fn packet(event: &PacketEvent) -> Self {
        Self {
            kind: MessageKind::Packet,
            payload: to_payload(event),
        }
    }

    pub fn rssi(sample: &RssiSample) -> Self {
        Self {
            kind: MessageKind::Rssi,
            payload: to_payload(sample),
        }
    }

    pub fn heartbeat(now: DateTime<Utc>) -> Self {
        Self {
            kind: MessageKind::Heartbeat,
            payload: serde_json::json!({ "timestamp": now.to_rfc3339() }),
        }
    }
}

/// Serialize an event into a generic key-value payload for the stream.
///
/// Our types serialize infallibly (no non-string keys, no NaN inputs
/// survive JSON parsing), so a failure collapses to `null` rather than
/// propagating an error through the infallible publish path.
pub(crate) fn to_payload<T: Serialize>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_effective_timestamp_prefers_explicit() {
        let explicit = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let packet = PacketEvent {
            timestamp: Some(explicit),
            unix_time: Some(0),
            ..Default::default()
        };
        assert_eq!(packet.effective_timestamp(Utc::now()), explicit);
    }

    #[test]
    fn test_effective_timestamp_falls_back_to_unix_time() {
        let packet = PacketEvent {
            unix_time: Some(1_700_000_000),
            ..Default::default()
        };
        let expected = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        assert_eq!(packet.effective_timestamp(Utc::now()), expected);
    }

    #[test]
    fn test_effective_timestamp_uses_fallback_when_unset() {
        let fallback = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let packet = PacketEvent::default();
        assert_eq!(packet.effective_timestamp(fallback), fallback);

        let sample = RssiSample {
            timestamp: None,
            dbm: -60.0,
            frequency_mhz: 144.39,
            integration_ms: None,
            metadata: None,
        };
        assert_eq!(sample.effective_timestamp(fallback), fallback);
    }

    #[test]
    fn test_packet_ignores_unknown_fields() {
        let packet: PacketEvent = serde_json::from_str(
            r#"{"source_callsign":"TEST-1","mystery_column":42,"another":"x"}"#,
        )
        .unwrap();
        assert_eq!(packet.source_callsign.as_deref(), Some("TEST-1"));
        assert_eq!(packet.message_type, "packet");
    }

    #[test]
    fn test_heartbeat_payload_carries_timestamp() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let message = StreamMessage::heartbeat(now);
        assert_eq!(message.kind, MessageKind::Heartbeat);
        assert_eq!(
            message.payload["timestamp"].as_str().unwrap(),
            now.to_rfc3339()
        );
    }
}
