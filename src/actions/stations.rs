//! Station history endpoint backed by the last-seen index.

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Json};
use chrono::{Duration, Utc};
use serde::Deserialize;

use crate::models::PacketEvent;
use crate::web::AppState;

const DEFAULT_WINDOW_SECONDS: i64 = 3600;
const MIN_WINDOW_SECONDS: i64 = 60;
const MAX_WINDOW_SECONDS: i64 = 24 * 60 * 60;

#[derive(Debug, Deserialize)]
pub struct StationsQuery {
    pub within_seconds: Option<i64>,
}

/// Stations heard within the requested window, one latest packet each.
/// GET /v1/stations?within_seconds=3600
pub async fn list_recent_stations(
    Query(query): Query<StationsQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let window = query
        .within_seconds
        .unwrap_or(DEFAULT_WINDOW_SECONDS)
        .clamp(MIN_WINDOW_SECONDS, MAX_WINDOW_SECONDS);
    let cutoff = Utc::now() - Duration::seconds(window);

    let stations: Vec<PacketEvent> = state.store.stations_since(cutoff).into_values().collect();
    Json(stations)
}
