//! Health and stats endpoints.

use axum::extract::State;
use axum::response::{IntoResponse, Json};
use serde::Serialize;
use serde_json::json;

use crate::web::AppState;

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub packets: usize,
    pub rssi_samples: usize,
    pub stations_tracked: usize,
    pub retention_seconds: u64,
    pub max_history_items: usize,
}

/// Simple health check for uptime monitoring.
/// GET /healthz
pub async fn healthz() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Counts for packets, RSSI samples, and tracked stations, plus the
/// configured limits.
/// GET /stats
pub async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    let counts = state.store.counts();
    Json(StatsResponse {
        packets: counts.packets,
        rssi_samples: counts.rssi_samples,
        stations_tracked: counts.stations_tracked,
        retention_seconds: state.settings.history_retention_seconds,
        max_history_items: state.settings.max_history_items,
    })
}
