pub mod aggregate;
pub mod error;
pub mod executor;
pub mod session;
pub mod store;

pub use aggregate::{
    SessionStats, StatsCache, aggregate, count_by_severity, highest_severity, open_port_count,
    total_vulnerabilities, vulnerabilities_by_severity,
};
pub use error::CoreError;
pub use executor::{Dispatcher, ReplayExecutor, ScanExecutor, ScanHandle};
pub use session::{CANCELLED_REASON, ScanEvent, ScanSession, ScanStatus, SessionId, now_ms};
pub use store::{InitialStatus, SessionStore, SessionSummary, StoreSnapshot};
pub use tokio_util::sync::CancellationToken;
