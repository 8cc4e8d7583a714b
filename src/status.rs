//! HTTP status listener: liveness, the last cycle report, and metrics.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use parking_lot::RwLock;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::metrics::Metrics;
use crate::report::CycleReport;

const SERVICE_NAME: &str = "vpn-checker";

/// Most recent completed cycle, shared between the scheduler and handlers.
#[derive(Clone)]
pub struct StatusBoard {
    last: Arc<RwLock<Option<CycleReport>>>,
    started: Instant,
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusBoard {
    pub fn new() -> Self {
        Self {
            last: Arc::new(RwLock::new(None)),
            started: Instant::now(),
        }
    }

    pub fn publish(&self, report: CycleReport) {
        *self.last.write() = Some(report);
    }

    pub fn latest(&self) -> Option<CycleReport> {
        self.last.read().clone()
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub board: StatusBoard,
    pub metrics: Metrics,
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let last_cycle = state
        .board
        .last
        .read()
        .as_ref()
        .map(|report| report.finished_at.to_rfc3339());
    Json(serde_json::json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "timestamp": Utc::now().to_rfc3339(),
        "uptime_secs": state.board.uptime_secs(),
        "last_cycle": last_cycle,
    }))
}

async fn report(State(state): State<AppState>) -> Response {
    match state.board.latest() {
        Some(report) => Json(report).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "no check cycle has completed yet" })),
        )
            .into_response(),
    }
}

async fn metrics(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}")).into_response(),
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/report", get(report))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Bind the status listener address.
pub async fn bind(host: &str, port: u16) -> anyhow::Result<TcpListener> {
    let addr = format!("{host}:{port}");
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind status listener on {addr}"))?;
    tracing::info!(addr = %addr, "status listener bound");
    Ok(listener)
}

/// Serve the status router on `listener` until `shutdown` is cancelled.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}
