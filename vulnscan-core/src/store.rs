// ---------------------------------------------------------------------------
// Scan session store
// ---------------------------------------------------------------------------
//
// Owns every session plus the operator's current selection. All mutation
// happens under one write lock, so a reader never observes a half-applied
// event and concurrent updates to the same session are serialized.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use vulnscan_types::{ScanConfig, ScanRequest, ScanType};

use crate::aggregate::{SessionStats, aggregate};
use crate::error::CoreError;
use crate::session::{CANCELLED_REASON, ScanEvent, ScanSession, ScanStatus, SessionId};

/// Status a freshly created session starts in.
///
/// `Running` matches an executor that starts work synchronously on
/// submission; `Queued` waits for an explicit `accepted` event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InitialStatus {
    #[default]
    Running,
    Queued,
}

impl InitialStatus {
    fn status(self) -> ScanStatus {
        match self {
            Self::Running => ScanStatus::Running,
            Self::Queued => ScanStatus::Queued,
        }
    }
}

/// One row of the session history listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub id: SessionId,
    pub target: String,
    pub scan_type: ScanType,
    pub status: ScanStatus,
    pub timestamp: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<u64>,
    pub stats: SessionStats,
}

impl SessionSummary {
    fn of(session: &ScanSession) -> Self {
        Self {
            id: session.id().clone(),
            target: session.target().to_string(),
            scan_type: session.config().scan_type(),
            status: session.status().clone(),
            timestamp: session.timestamp(),
            finished_at: session.finished_at(),
            stats: aggregate(session),
        }
    }
}

/// Serializable copy of the whole store, used for history files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub initial_status: InitialStatus,
    #[serde(default)]
    pub sessions: Vec<ScanSession>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected: Option<SessionId>,
}

#[derive(Debug, Default)]
struct StoreInner {
    /// Creation order.
    sessions: Vec<ScanSession>,
    selected: Option<SessionId>,
}

impl StoreInner {
    fn find(&self, id: &SessionId) -> Result<&ScanSession, CoreError> {
        self.sessions
            .iter()
            .find(|s| s.id() == id)
            .ok_or_else(|| CoreError::NotFound(id.clone()))
    }

    fn find_mut(&mut self, id: &SessionId) -> Result<&mut ScanSession, CoreError> {
        self.sessions
            .iter_mut()
            .find(|s| s.id() == id)
            .ok_or_else(|| CoreError::NotFound(id.clone()))
    }
}

/// Thread-safe registry of scan sessions.
#[derive(Debug, Default)]
pub struct SessionStore {
    inner: RwLock<StoreInner>,
    initial_status: InitialStatus,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_initial_status(initial_status: InitialStatus) -> Self {
        Self {
            inner: RwLock::default(),
            initial_status,
        }
    }

    pub fn initial_status(&self) -> InitialStatus {
        self.initial_status
    }

    // A panic while holding the lock cannot leave a session half-updated
    // (apply validates before mutating), so poisoned guards are usable.
    fn read(&self) -> RwLockReadGuard<'_, StoreInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new session for an already validated configuration.
    pub fn create(&self, config: ScanConfig) -> SessionId {
        let session = ScanSession::new(config, self.initial_status.status());
        let id = session.id().clone();
        info!(
            scan_id = %id,
            scan_target = session.target(),
            scan_type = %session.config().scan_type(),
            status = session.status().name(),
            "scan session created"
        );
        self.write().sessions.push(session);
        id
    }

    /// Validate a raw request and register it.
    pub fn submit(&self, request: ScanRequest) -> Result<SessionId, CoreError> {
        let config = request.into_config().inspect_err(|e| {
            warn!(field = e.field(), error = %e, "scan request rejected");
        })?;
        Ok(self.create(config))
    }

    /// Apply one executor event to a session. Returns the updated session.
    pub fn update(&self, id: &SessionId, event: ScanEvent) -> Result<ScanSession, CoreError> {
        let mut inner = self.write();
        let session = inner.find_mut(id)?;
        let name = event.name();
        session.apply(event).inspect_err(|e| {
            debug!(scan_id = %id, event = name, error = %e, "event rejected");
        })?;

        match session.status() {
            ScanStatus::Completed if name == "completed" => {
                info!(scan_id = %id, ports = session.ports().len(), "scan completed");
            }
            ScanStatus::Failed { reason } if name == "failed" => {
                warn!(scan_id = %id, reason = %reason, "scan failed");
            }
            _ => debug!(scan_id = %id, event = name, version = session.version(), "event applied"),
        }
        Ok(session.clone())
    }

    pub fn get(&self, id: &SessionId) -> Result<ScanSession, CoreError> {
        self.read().find(id).cloned()
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.read().find(id).is_ok()
    }

    /// Mark a session as the operator's focus. Any status may be selected.
    pub fn select(&self, id: &SessionId) -> Result<ScanSession, CoreError> {
        let mut inner = self.write();
        let session = inner.find(id)?.clone();
        inner.selected = Some(id.clone());
        debug!(scan_id = %id, "session selected");
        Ok(session)
    }

    pub fn selected(&self) -> Option<ScanSession> {
        let inner = self.read();
        let id = inner.selected.as_ref()?;
        inner.find(id).ok().cloned()
    }

    pub fn clear_selection(&self) {
        self.write().selected = None;
    }

    /// Delete a session in any status. Clears the selection if it pointed here.
    pub fn remove(&self, id: &SessionId) -> Result<ScanSession, CoreError> {
        let mut inner = self.write();
        let index = inner
            .sessions
            .iter()
            .position(|s| s.id() == id)
            .ok_or_else(|| CoreError::NotFound(id.clone()))?;
        let removed = inner.sessions.remove(index);
        if inner.selected.as_ref() == Some(id) {
            inner.selected = None;
        }
        info!(scan_id = %id, status = removed.status().name(), "scan session removed");
        Ok(removed)
    }

    /// Operator cancellation: `running -> failed("cancelled")`.
    pub fn cancel(&self, id: &SessionId) -> Result<ScanSession, CoreError> {
        let mut inner = self.write();
        let session = inner.find_mut(id)?;
        if session.status() != &ScanStatus::Running {
            return Err(CoreError::InvalidTransition {
                id: id.clone(),
                from: session.status().name(),
                attempted: "cancel",
            });
        }
        session.apply(ScanEvent::Failed {
            reason: CANCELLED_REASON.to_string(),
        })?;
        info!(scan_id = %id, "scan cancelled");
        Ok(session.clone())
    }

    /// All sessions, oldest first.
    pub fn list(&self) -> Vec<ScanSession> {
        self.read().sessions.clone()
    }

    pub fn summaries(&self) -> Vec<SessionSummary> {
        self.read().sessions.iter().map(SessionSummary::of).collect()
    }

    pub fn len(&self) -> usize {
        self.read().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().sessions.is_empty()
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        let inner = self.read();
        StoreSnapshot {
            initial_status: self.initial_status,
            sessions: inner.sessions.clone(),
            selected: inner.selected.clone(),
        }
    }

    /// Rebuild a store from a snapshot. A selection that names no stored
    /// session is dropped.
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let mut inner = StoreInner {
            sessions: snapshot.sessions,
            selected: snapshot.selected,
        };
        if let Some(ref id) = inner.selected
            && inner.find(id).is_err()
        {
            warn!(scan_id = %id, "dropping selection of unknown session");
            inner.selected = None;
        }
        Self {
            inner: RwLock::new(inner),
            initial_status: snapshot.initial_status,
        }
    }
}
