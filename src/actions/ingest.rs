//! Ingestion endpoints for packets and RSSI samples.
//!
//! Validation happens here at the boundary; the store and hub never see a
//! malformed event. For each accepted item the handler inserts into the
//! store and then publishes to the hub, with no await between the two, so
//! a snapshot taken by a joining session never observes one without the
//! other.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{PacketEvent, RssiSample, StreamMessage};
use crate::web::AppState;

use super::json_error;

/// Accepts either `{"packets": [...]}` or a single bare packet object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum PacketsPayload {
    Batch { packets: Vec<PacketEvent> },
    Single(Box<PacketEvent>),
}

#[derive(Debug, Deserialize)]
pub struct RssiPayload {
    pub samples: Vec<RssiSample>,
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub accepted: usize,
}

fn validate_packet(packet: &PacketEvent) -> Result<(), String> {
    if let Some(latitude) = packet.latitude
        && !(-90.0..=90.0).contains(&latitude)
    {
        return Err(format!("latitude out of range: {}", latitude));
    }
    if let Some(longitude) = packet.longitude
        && !(-180.0..=180.0).contains(&longitude)
    {
        return Err(format!("longitude out of range: {}", longitude));
    }
    if let Some(unix_time) = packet.unix_time
        && unix_time < 0
    {
        return Err(format!("unix_time must be non-negative: {}", unix_time));
    }
    Ok(())
}

fn validate_sample(sample: &RssiSample) -> Result<(), String> {
    if !sample.dbm.is_finite() {
        return Err("dbm must be a finite number".to_string());
    }
    if let Some(integration_ms) = sample.integration_ms
        && integration_ms == 0
    {
        return Err("integration_ms must be at least 1".to_string());
    }
    Ok(())
}

/// Accept APRS packets and broadcast them to connected displays.
/// POST /v1/packets
pub async fn ingest_packets(
    State(state): State<AppState>,
    Json(payload): Json<PacketsPayload>,
) -> impl IntoResponse {
    let packets = match payload {
        PacketsPayload::Batch { packets } => packets,
        PacketsPayload::Single(packet) => vec![*packet],
    };

    for packet in &packets {
        if let Err(reason) = validate_packet(packet) {
            return json_error(StatusCode::UNPROCESSABLE_ENTITY, &reason).into_response();
        }
    }

    let accepted = packets.len();
    for packet in packets {
        let message = StreamMessage::packet(&packet);
        state.store.insert_packet(packet);
        state.hub.publish(&message);
    }
    metrics::counter!("ingest.packets.accepted").increment(accepted as u64);
    debug!(accepted, "ingested packets");

    Json(IngestResponse { accepted }).into_response()
}

/// Accept RSSI samples from rtl_power or similar monitors.
/// POST /v1/rssi
pub async fn ingest_rssi(
    State(state): State<AppState>,
    Json(payload): Json<RssiPayload>,
) -> impl IntoResponse {
    for sample in &payload.samples {
        if let Err(reason) = validate_sample(sample) {
            return json_error(StatusCode::UNPROCESSABLE_ENTITY, &reason).into_response();
        }
    }

    let accepted = payload.samples.len();
    for sample in payload.samples {
        let message = StreamMessage::rssi(&sample);
        state.store.insert_rssi(sample);
        state.hub.publish(&message);
    }
    metrics::counter!("ingest.rssi.accepted").increment(accepted as u64);
    debug!(accepted, "ingested rssi samples");

    Json(IngestResponse { accepted }).into_response()
}

/// Recent packet history, insertion order.
/// GET /v1/packets
pub async fn recent_packets(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.store.recent_packets())
}

/// Recent RSSI history, insertion order.
/// GET /v1/rssi
pub async fn recent_rssi(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.store.recent_samples())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_packet_rejects_out_of_range_coordinates() {
        let mut packet = PacketEvent {
            latitude: Some(91.0),
            ..Default::default()
        };
        assert!(validate_packet(&packet).is_err());

        packet.latitude = Some(41.5);
        packet.longitude = Some(-181.0);
        assert!(validate_packet(&packet).is_err());

        packet.longitude = Some(-87.6);
        assert!(validate_packet(&packet).is_ok());
    }

    #[test]
    fn test_validate_sample_rejects_zero_integration() {
        let sample = RssiSample {
            timestamp: None,
            dbm: -42.5,
            frequency_mhz: 144.39,
            integration_ms: Some(0),
            metadata: None,
        };
        assert!(validate_sample(&sample).is_err());
    }

    #[test]
    fn test_packets_payload_accepts_bare_object() {
        let payload: PacketsPayload =
            serde_json::from_str(r#"{"source_callsign":"TEST-1"}"#).unwrap();
        assert!(matches!(payload, PacketsPayload::Single(_)));

        let payload: PacketsPayload =
            serde_json::from_str(r#"{"packets":[{"source_callsign":"TEST-1"}]}"#).unwrap();
        assert!(matches!(payload, PacketsPayload::Batch { .. }));
    }
}
