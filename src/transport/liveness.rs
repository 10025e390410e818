//! Keepalive HTTP responder for external uptime monitors.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use tokio_util::sync::CancellationToken;
use tower_http::timeout::TimeoutLayer;

use crate::session::SessionStatus;

pub const ACKNOWLEDGEMENT: &str = "grouplock is running";
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Bind `host:port` and serve until `shutdown` fires.
pub async fn run_liveness(
    host: &str,
    port: u16,
    status: SessionStatus,
    shutdown: CancellationToken,
) -> Result<()> {
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .context("parse liveness bind address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind liveness socket {addr}"))?;
    run_liveness_with_listener(listener, status, shutdown).await
}

pub async fn run_liveness_with_listener(
    listener: tokio::net::TcpListener,
    status: SessionStatus,
    shutdown: CancellationToken,
) -> Result<()> {
    let local = listener
        .local_addr()
        .context("get liveness listener local address")?;
    tracing::info!(%local, "liveness endpoint listening");

    axum::serve(listener, build_app(status))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("serve liveness endpoint")
}

fn build_app(status: SessionStatus) -> Router {
    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .with_state(status)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
        ))
}

async fn handle_root() -> &'static str {
    ACKNOWLEDGEMENT
}

async fn handle_health(State(status): State<SessionStatus>) -> impl IntoResponse {
    let snapshot = status.snapshot();
    Json(serde_json::json!({
        "status": "ok",
        "session": snapshot.state.to_string(),
        "since": snapshot.since.to_rfc3339(),
        "reconnects": snapshot.reconnects,
    }))
}
