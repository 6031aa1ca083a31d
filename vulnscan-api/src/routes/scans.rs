// ---------------------------------------------------------------------------
// Scan session routes (operator side)
// ---------------------------------------------------------------------------

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::info;
use vulnscan_core::{
    ScanSession, ScanStatus, SessionId, SessionStats, SessionSummary, highest_severity,
};
use vulnscan_types::{ScanRequest, Severity};

use crate::error::ApiError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// POST /api/scans: create a session
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct CreateScanResponse {
    pub scan_id: SessionId,
    pub status: ScanStatus,
    /// Argument vector the executor should run.
    pub args: Vec<String>,
}

pub async fn create_scan(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ScanRequest>,
) -> Result<(StatusCode, Json<CreateScanResponse>), ApiError> {
    let scan_id = match state.dispatcher {
        Some(ref dispatcher) => dispatcher.submit_request(request).await?.id().clone(),
        None => state.store.submit(request)?,
    };
    let session = state.store.get(&scan_id)?;

    info!(scan_id = %scan_id, "scan created via API");

    Ok((
        StatusCode::CREATED,
        Json(CreateScanResponse {
            scan_id,
            status: session.status().clone(),
            args: session.config().engine_args(),
        }),
    ))
}

// ---------------------------------------------------------------------------
// GET /api/scans: session history
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ListScansQuery {
    pub status: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ListScansResponse {
    pub scans: Vec<SessionSummary>,
    pub total: usize,
}

const STATUS_NAMES: [&str; 4] = ["queued", "running", "completed", "failed"];
const DEFAULT_PAGE_SIZE: usize = 50;
const MAX_PAGE_SIZE: usize = 200;

pub async fn list_scans(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListScansQuery>,
) -> Result<Json<ListScansResponse>, ApiError> {
    if let Some(ref filter) = params.status
        && !STATUS_NAMES.contains(&filter.as_str())
    {
        return Err(ApiError::BadRequest(format!(
            "unknown status filter {filter:?} (expected one of: {})",
            STATUS_NAMES.join(", ")
        )));
    }

    let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE);
    let offset = params.offset.unwrap_or(0);

    // Insertion order, oldest first.
    let summaries: Vec<SessionSummary> = state
        .store
        .summaries()
        .into_iter()
        .filter(|s| match params.status {
            Some(ref filter) => s.status.name() == filter,
            None => true,
        })
        .collect();

    let total = summaries.len();
    let scans = summaries.into_iter().skip(offset).take(limit).collect();

    Ok(Json(ListScansResponse { scans, total }))
}

// ---------------------------------------------------------------------------
// GET /api/scans/{id}, GET /api/scans/selected
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ScanDetailResponse {
    #[serde(flatten)]
    pub session: ScanSession,
    pub stats: SessionStats,
    pub highest_severity: Option<Severity>,
}

async fn detail(state: &AppState, session: ScanSession) -> ScanDetailResponse {
    let stats = state.stats_for(&session).await;
    ScanDetailResponse {
        highest_severity: highest_severity(&session),
        stats,
        session,
    }
}

/// Looking a session up does not change the selection.
pub async fn get_scan(
    State(state): State<Arc<AppState>>,
    Path(scan_id): Path<String>,
) -> Result<Json<ScanDetailResponse>, ApiError> {
    let session = state.store.get(&SessionId::from(scan_id))?;
    Ok(Json(detail(&state, session).await))
}

pub async fn get_selected(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ScanDetailResponse>, ApiError> {
    let session = state
        .store
        .selected()
        .ok_or_else(|| ApiError::NotFound("no scan session selected".into()))?;
    Ok(Json(detail(&state, session).await))
}

// ---------------------------------------------------------------------------
// POST /api/scans/{id}/select
// ---------------------------------------------------------------------------

pub async fn select_scan(
    State(state): State<Arc<AppState>>,
    Path(scan_id): Path<String>,
) -> Result<Json<ScanDetailResponse>, ApiError> {
    let session = state.store.select(&SessionId::from(scan_id))?;
    Ok(Json(detail(&state, session).await))
}

// ---------------------------------------------------------------------------
// DELETE /api/scans/{id}
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: bool,
}

pub async fn delete_scan(
    State(state): State<Arc<AppState>>,
    Path(scan_id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let id = SessionId::from(scan_id);
    match state.dispatcher {
        Some(ref dispatcher) => dispatcher.remove(&id).await?,
        None => state.store.remove(&id)?,
    };
    state.stats.lock().await.invalidate(&id);
    Ok(Json(DeleteResponse { deleted: true }))
}

// ---------------------------------------------------------------------------
// POST /api/scans/{id}/stop: cancel a running scan
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct StopResponse {
    pub scan_id: SessionId,
    pub stopped: bool,
    pub status: ScanStatus,
}

pub async fn stop_scan(
    State(state): State<Arc<AppState>>,
    Path(scan_id): Path<String>,
) -> Result<Json<StopResponse>, ApiError> {
    let id = SessionId::from(scan_id);
    let session = match state.dispatcher {
        Some(ref dispatcher) => dispatcher.cancel(&id).await?,
        None => state.store.cancel(&id)?,
    };

    info!(scan_id = %id, "scan stopped");

    Ok(Json(StopResponse {
        scan_id: id,
        stopped: true,
        status: session.status().clone(),
    }))
}
