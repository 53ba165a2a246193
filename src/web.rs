//! Axum application: shared state, router, middleware, server startup.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use metrics_exporter_prometheus::PrometheusBuilder;
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use uuid::Uuid;

use crate::actions;
use crate::config::Settings;
use crate::hub::BroadcastHub;
use crate::store::RetentionStore;

// Embed the display page into the binary
static INDEX_HTML: &str = include_str!("../web/index.html");

/// Explicitly constructed and owned shared state, handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RetentionStore>,
    pub hub: Arc<BroadcastHub>,
    pub settings: Settings,
}

impl AppState {
    pub fn new(settings: Settings) -> Result<Self> {
        let store = RetentionStore::new(settings.retention_window(), settings.max_history_items)?;
        Ok(Self {
            store: Arc::new(store),
            hub: BroadcastHub::new(),
            settings,
        })
    }
}

async fn serve_frontend() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        INDEX_HTML,
    )
}

// Middleware for request logging with correlation ID
async fn request_logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = Uuid::new_v4().to_string()[..8].to_string();
    let start_time = Instant::now();

    let response = next.run(request).await;
    let duration = start_time.elapsed();

    info!(
        "{} {} [{}] {} in {:.2}ms",
        method,
        path,
        request_id,
        response.status().as_u16(),
        duration.as_secs_f64() * 1000.0
    );

    response
}

/// Build the application router. Kept separate from server startup so
/// tests can drive it directly.
pub fn router(state: AppState) -> Router {
    let api_router = Router::new()
        .route(
            "/packets",
            post(actions::ingest_packets).get(actions::recent_packets),
        )
        .route("/rssi", post(actions::ingest_rssi).get(actions::recent_rssi))
        .route("/stations", get(actions::list_recent_stations))
        .route("/stream", get(actions::stream_updates))
        .with_state(state.clone());

    Router::new()
        .route("/", get(serve_frontend))
        .route("/healthz", get(actions::healthz))
        .route("/stats", get(actions::stats))
        .nest("/v1", api_router)
        .with_state(state)
        .layer(middleware::from_fn(request_logging_middleware))
        .layer(CorsLayer::permissive())
}

pub async fn start_web_server(interface: String, port: u16, state: AppState) -> Result<()> {
    info!("Starting web server on {}:{}", interface, port);

    let prometheus = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus metrics recorder")?;

    let app = router(state).route("/metrics", get(move || async move { prometheus.render() }));

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", interface, port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", interface, port))?;
    info!("Web server listening on http://{}:{}", interface, port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => error!(error = %e, "Failed to install SIGTERM handler"),
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("Shutdown signal received, stopping web server");
}
