use vulnscan_types::ConfigError;

use crate::session::SessionId;

/// Errors surfaced synchronously by the session store.
///
/// A scan that fails is not an error here: it is a `failed` status carrying
/// its reason.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
    #[error("scan session not found: {0}")]
    NotFound(SessionId),
    #[error("invalid transition for {id}: cannot apply {attempted} while {from}")]
    InvalidTransition {
        id: SessionId,
        from: &'static str,
        attempted: &'static str,
    },
    #[error("invalid finding: {0}")]
    InvalidFinding(String),
}
