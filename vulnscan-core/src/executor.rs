// ---------------------------------------------------------------------------
// Executor event streams
// ---------------------------------------------------------------------------
//
// Every submitted session gets its own mpsc channel. The executor writes
// events into it; a relay task applies them to the store one at a time, in
// order, so events for the same session never race each other.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vulnscan_types::{ScanConfig, ScanRequest};

use crate::error::CoreError;
use crate::session::{ScanEvent, ScanSession, SessionId};
use crate::store::SessionStore;

/// Buffered events per session before the executor is back-pressured.
const EVENT_CHANNEL_CAPACITY: usize = 64;

const TERMINATED_UNEXPECTEDLY: &str = "executor terminated unexpectedly";

/// The external system that performs the probing.
///
/// `launch` must not block: implementations spawn their own work and report
/// through `events`. Dropping the sender without a terminal event fails the
/// session. Once `cancel` fires the session is already failed and further
/// events are discarded.
pub trait ScanExecutor: Send + Sync {
    fn launch(
        &self,
        id: &SessionId,
        config: &ScanConfig,
        events: mpsc::Sender<ScanEvent>,
        cancel: CancellationToken,
    );
}

/// A submitted session and the task applying its events.
#[derive(Debug)]
pub struct ScanHandle {
    id: SessionId,
    relay: JoinHandle<()>,
}

impl ScanHandle {
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Wait until the executor's stream has been fully applied.
    pub async fn finished(self) -> SessionId {
        if let Err(e) = self.relay.await {
            warn!(scan_id = %self.id, error = %e, "event relay task failed");
        }
        self.id
    }
}

/// Connects the session store to a [`ScanExecutor`].
#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<SessionStore>,
    executor: Arc<dyn ScanExecutor>,
    running: Arc<Mutex<HashMap<SessionId, CancellationToken>>>,
}

impl Dispatcher {
    pub fn new(store: Arc<SessionStore>, executor: Arc<dyn ScanExecutor>) -> Self {
        Self {
            store,
            executor,
            running: Arc::default(),
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Create a session for `config` and hand it to the executor.
    pub async fn submit(&self, config: ScanConfig) -> ScanHandle {
        let id = self.store.create(config.clone());
        let cancel = CancellationToken::new();
        self.running.lock().await.insert(id.clone(), cancel.clone());

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let relay = tokio::spawn(relay_events(
            rx,
            self.store.clone(),
            self.running.clone(),
            id.clone(),
        ));
        self.executor.launch(&id, &config, tx, cancel);

        info!(scan_id = %id, args = ?config.engine_args(), "scan dispatched");
        ScanHandle { id, relay }
    }

    pub async fn submit_request(&self, request: ScanRequest) -> Result<ScanHandle, CoreError> {
        let config = request.into_config()?;
        Ok(self.submit(config).await)
    }

    /// Fail the session as cancelled, then signal the executor to stop.
    pub async fn cancel(&self, id: &SessionId) -> Result<ScanSession, CoreError> {
        let session = self.store.cancel(id)?;
        // Clone the token and release the lock before cancelling.
        let token = self.running.lock().await.get(id).cloned();
        if let Some(token) = token {
            token.cancel();
        }
        Ok(session)
    }

    /// Delete a session and stop its executor if it is still working.
    pub async fn remove(&self, id: &SessionId) -> Result<ScanSession, CoreError> {
        let removed = self.store.remove(id)?;
        let token = self.running.lock().await.remove(id);
        if let Some(token) = token {
            debug!(scan_id = %id, "stopping executor for removed session");
            token.cancel();
        }
        Ok(removed)
    }

    /// Sessions whose event stream is still open.
    pub async fn active(&self) -> usize {
        self.running.lock().await.len()
    }
}

async fn relay_events(
    mut rx: mpsc::Receiver<ScanEvent>,
    store: Arc<SessionStore>,
    running: Arc<Mutex<HashMap<SessionId, CancellationToken>>>,
    id: SessionId,
) {
    while let Some(event) = rx.recv().await {
        let name = event.name();
        match store.update(&id, event) {
            Ok(_) => {}
            Err(CoreError::NotFound(_)) => {
                debug!(scan_id = %id, "session removed, dropping executor stream");
                break;
            }
            Err(e) => {
                match store.get(&id) {
                    Ok(session) if session.is_terminal() => {
                        debug!(scan_id = %id, event = name, "discarding event for finished session");
                    }
                    _ => {
                        warn!(scan_id = %id, event = name, error = %e, "executor protocol error");
                        fail(&store, &id, format!("executor protocol error: {e}"));
                    }
                }
                break;
            }
        }
    }

    // Closing the stream without a terminal event means the executor died.
    if let Ok(session) = store.get(&id)
        && !session.is_terminal()
    {
        warn!(scan_id = %id, status = session.status().name(), "{TERMINATED_UNEXPECTEDLY}");
        fail(&store, &id, TERMINATED_UNEXPECTEDLY.to_string());
    }

    // The executor has nothing left to report for a finished or deleted
    // session.
    let token = running.lock().await.remove(&id);
    let done = store.get(&id).is_ok_and(|s| s.is_terminal()) || !store.contains(&id);
    if let Some(token) = token
        && done
    {
        token.cancel();
    }
}

fn fail(store: &SessionStore, id: &SessionId, reason: String) {
    if let Err(e) = store.update(id, ScanEvent::Failed { reason }) {
        // Queued sessions cannot fail before being accepted.
        warn!(scan_id = %id, error = %e, "could not mark session failed");
    }
}

/// Replays a recorded list of events, one every `delay`.
#[derive(Debug, Clone, Default)]
pub struct ReplayExecutor {
    events: Vec<ScanEvent>,
    delay: Duration,
}

impl ReplayExecutor {
    pub fn new(events: Vec<ScanEvent>) -> Self {
        Self {
            events,
            delay: Duration::ZERO,
        }
    }

    /// Parse a replay log: a JSON array of events.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn events(&self) -> &[ScanEvent] {
        &self.events
    }
}

impl ScanExecutor for ReplayExecutor {
    fn launch(
        &self,
        id: &SessionId,
        _config: &ScanConfig,
        events: mpsc::Sender<ScanEvent>,
        cancel: CancellationToken,
    ) {
        let replay = self.events.clone();
        let delay = self.delay;
        let id = id.clone();
        tokio::spawn(async move {
            for event in replay {
                if delay.is_zero() {
                    if cancel.is_cancelled() {
                        debug!(scan_id = %id, "replay cancelled");
                        return;
                    }
                } else {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            debug!(scan_id = %id, "replay cancelled");
                            return;
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                if events.send(event).await.is_err() {
                    return;
                }
            }
        });
    }
}
