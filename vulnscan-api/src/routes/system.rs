// ---------------------------------------------------------------------------
// System routes: health check + status
// ---------------------------------------------------------------------------

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Serialize;
use vulnscan_core::ScanStatus;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Liveness only; nothing about the sessions.
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
    })
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub uptime_secs: u64,
    pub sessions: usize,
    pub running: usize,
    pub executor: bool,
}

pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let sessions = state.store.list();
    let running = sessions
        .iter()
        .filter(|s| s.status() == &ScanStatus::Running)
        .count();

    Json(StatusResponse {
        uptime_secs: state.started_at.elapsed().as_secs(),
        sessions: sessions.len(),
        running,
        executor: state.dispatcher.is_some(),
    })
}
