// ---------------------------------------------------------------------------
// Executor callback routes
// ---------------------------------------------------------------------------
//
// An out-of-process executor reports progress here. Each request is exactly
// one event applied atomically to the session.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};
use vulnscan_core::{ScanEvent, ScanStatus, SessionId};
use vulnscan_types::{HostInfo, Port, Protocol, Vulnerability};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct EventAck {
    pub scan_id: SessionId,
    pub status: ScanStatus,
    pub version: u64,
}

async fn apply(
    state: &AppState,
    scan_id: String,
    event: ScanEvent,
) -> Result<Json<EventAck>, ApiError> {
    let id = SessionId::from(scan_id);
    let session = state.store.update(&id, event)?;
    Ok(Json(EventAck {
        scan_id: id,
        status: session.status().clone(),
        version: session.version(),
    }))
}

/// A single port, or the full port list to replace the current one.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum PortReport {
    One(Port),
    All(Vec<Port>),
}

#[derive(Debug, Deserialize)]
pub struct VulnerabilityReport {
    pub port: u16,
    #[serde(default = "default_protocol")]
    pub protocol: Protocol,
    pub vulnerability: Vulnerability,
}

fn default_protocol() -> Protocol {
    Protocol::Tcp
}

#[derive(Debug, Deserialize)]
pub struct FailureReport {
    #[serde(default)]
    pub reason: String,
}

pub async fn accepted(
    State(state): State<Arc<AppState>>,
    Path(scan_id): Path<String>,
) -> Result<Json<EventAck>, ApiError> {
    apply(&state, scan_id, ScanEvent::Accepted).await
}

pub async fn port_found(
    State(state): State<Arc<AppState>>,
    Path(scan_id): Path<String>,
    Json(report): Json<PortReport>,
) -> Result<Json<EventAck>, ApiError> {
    let event = match report {
        PortReport::One(port) => ScanEvent::PortFound(port),
        PortReport::All(ports) => ScanEvent::PortsReplaced { ports },
    };
    apply(&state, scan_id, event).await
}

pub async fn vulnerability_found(
    State(state): State<Arc<AppState>>,
    Path(scan_id): Path<String>,
    Json(report): Json<VulnerabilityReport>,
) -> Result<Json<EventAck>, ApiError> {
    let event = ScanEvent::VulnerabilityFound {
        port: report.port,
        protocol: report.protocol,
        vulnerability: report.vulnerability,
    };
    apply(&state, scan_id, event).await
}

pub async fn host_info(
    State(state): State<Arc<AppState>>,
    Path(scan_id): Path<String>,
    Json(info): Json<HostInfo>,
) -> Result<Json<EventAck>, ApiError> {
    apply(&state, scan_id, ScanEvent::HostInfo(info)).await
}

pub async fn completed(
    State(state): State<Arc<AppState>>,
    Path(scan_id): Path<String>,
) -> Result<Json<EventAck>, ApiError> {
    apply(&state, scan_id, ScanEvent::Completed).await
}

pub async fn failed(
    State(state): State<Arc<AppState>>,
    Path(scan_id): Path<String>,
    Json(report): Json<FailureReport>,
) -> Result<Json<EventAck>, ApiError> {
    apply(&state, scan_id, ScanEvent::Failed { reason: report.reason }).await
}
