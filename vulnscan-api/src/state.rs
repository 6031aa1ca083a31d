// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;
use vulnscan_core::{Dispatcher, ScanSession, SessionStats, SessionStore, StatsCache};

/// Global application state for the API server.
pub struct AppState {
    /// Every scan session known to this process.
    pub store: Arc<SessionStore>,
    /// In-process executor. Without one, sessions are only created and the
    /// external executor drives them through the callback routes.
    pub dispatcher: Option<Dispatcher>,
    /// Aggregates per session, recomputed when the session changes.
    pub stats: Mutex<StatsCache>,
    /// Server start time for uptime reporting.
    pub started_at: Instant,
}

impl AppState {
    pub fn new(store: Arc<SessionStore>) -> Self {
        Self {
            store,
            dispatcher: None,
            stats: Mutex::new(StatsCache::new()),
            started_at: Instant::now(),
        }
    }

    /// State whose scans are launched through `dispatcher`.
    pub fn with_dispatcher(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher: Some(dispatcher.clone()),
            ..Self::new(dispatcher.store().clone())
        }
    }

    /// Create an AppState over an empty store (for testing).
    pub fn new_in_memory() -> Self {
        Self::new(Arc::new(SessionStore::new()))
    }

    pub async fn stats_for(&self, session: &ScanSession) -> SessionStats {
        self.stats.lock().await.get_or_compute(session)
    }
}
