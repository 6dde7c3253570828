use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::{HealthState, LatencyStats};

#[derive(Clone)]
pub struct ApiState {
    pub health: Arc<HealthState>,
    pub latency: Arc<LatencyStats>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/stats/latency", get(get_stats_latency))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub scan_count: u64,
    pub last_run: Option<DateTime<Utc>>,
    pub last_cycle_ok: bool,
    pub markets_tracked: u64,
    pub alerts_sent: u64,
    pub consecutive_failures: u32,
}

#[derive(Serialize)]
pub struct LatencyResponse {
    pub samples: u64,
    pub p50_ms: Option<u64>,
    pub p95_ms: Option<u64>,
    pub p99_ms: Option<u64>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_health(State(state): State<ApiState>) -> Json<HealthResponse> {
    let h = &state.health;
    let status = match (h.last_run(), h.consecutive_failures()) {
        (None, 0) => "starting",
        (_, 0) => "ok",
        _ => "degraded",
    };
    Json(HealthResponse {
        status,
        scan_count: h.scan_count(),
        last_run: h.last_run(),
        last_cycle_ok: h.last_cycle_ok(),
        markets_tracked: h.markets_tracked(),
        alerts_sent: h.alerts_sent(),
        consecutive_failures: h.consecutive_failures(),
    })
}

async fn get_stats_latency(State(state): State<ApiState>) -> Json<LatencyResponse> {
    let (p50_ms, p95_ms, p99_ms) = state.latency.percentiles();
    Json(LatencyResponse {
        samples: state.latency.len(),
        p50_ms,
        p95_ms,
        p99_ms,
    })
}
