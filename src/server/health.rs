//! Probe and metrics endpoints
//!
//! - `/healthz` - Liveness: the process is up
//! - `/readyz` - Readiness: baseline established and not yet draining
//! - `/metrics` - Prometheus metrics in text format

use crate::controller::Phase;
use crate::server::metrics::SharedMetrics;
use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// Latest coordinator phase, shared with the probe server
///
/// The coordinator is the only writer.
#[derive(Debug, Clone)]
pub struct PhaseTracker {
    phase: Arc<AtomicU8>,
}

impl PhaseTracker {
    pub fn new() -> Self {
        Self {
            phase: Arc::new(AtomicU8::new(Phase::Initializing.ordinal() as u8)),
        }
    }

    pub fn set(&self, phase: Phase) {
        self.phase.store(phase.ordinal() as u8, Ordering::SeqCst);
    }

    pub fn get(&self) -> Phase {
        Phase::from_ordinal(self.phase.load(Ordering::SeqCst) as i64)
    }

    /// Ready only while steadily monitoring
    pub fn is_ready(&self) -> bool {
        self.get() == Phase::Monitoring
    }
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
struct ServerState {
    phase: PhaseTracker,
    metrics: SharedMetrics,
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

/// Returns 200 while monitoring, 503 otherwise, with the phase as body
async fn readyz(State(state): State<ServerState>) -> impl IntoResponse {
    let phase = state.phase.get();
    let status = if state.phase.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, phase.as_str())
}

async fn metrics(State(state): State<ServerState>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to encode metrics: {}", e),
        )
            .into_response(),
    }
}

fn build_router(phase: PhaseTracker, metrics: SharedMetrics) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(self::metrics))
        .with_state(ServerState { phase, metrics })
}

/// Serve probes and metrics on `port` until the process exits
pub async fn run_health_server(
    port: u16,
    phase: PhaseTracker,
    metrics: SharedMetrics,
) -> Result<(), std::io::Error> {
    let app = build_router(phase, metrics);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!(port = %port, "Probe and metrics server listening");

    axum::serve(listener, app)
        .await
        .map_err(std::io::Error::other)
}
