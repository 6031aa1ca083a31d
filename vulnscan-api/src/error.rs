// ---------------------------------------------------------------------------
// API error types
// ---------------------------------------------------------------------------

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use vulnscan_core::CoreError;

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: String,
    pub message: String,
}

#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request: malformed input outside the domain model.
    BadRequest(String),
    /// 404 Not Found: unknown session id.
    NotFound(String),
    /// 409 Conflict: transition not valid in the session's current state.
    Conflict(String),
    /// 422 Unprocessable Entity: scan request failed validation.
    InvalidConfig(String),
    /// 422 Unprocessable Entity: executor finding that cannot be applied.
    InvalidFinding(String),
    /// 500 Internal Server Error.
    Internal(String),
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidConfig(e) => ApiError::InvalidConfig(e.to_string()),
            CoreError::NotFound(_) => ApiError::NotFound(err.to_string()),
            CoreError::InvalidTransition { .. } => ApiError::Conflict(err.to_string()),
            CoreError::InvalidFinding(msg) => ApiError::InvalidFinding(msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_key, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "invalid_transition", msg),
            ApiError::InvalidConfig(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "invalid_config", msg)
            }
            ApiError::InvalidFinding(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "invalid_finding", msg)
            }
            ApiError::Internal(msg) => {
                // Keep internals in the server log only.
                tracing::error!(details = %msg, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal server error".to_string(),
                )
            }
        };

        (
            status,
            Json(ApiErrorBody {
                error: error_key.into(),
                message,
            }),
        )
            .into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "bad request: {msg}"),
            ApiError::NotFound(msg) => write!(f, "not found: {msg}"),
            ApiError::Conflict(msg) => write!(f, "conflict: {msg}"),
            ApiError::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            ApiError::InvalidFinding(msg) => write!(f, "invalid finding: {msg}"),
            ApiError::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vulnscan_core::SessionId;
    use vulnscan_types::ConfigError;

    fn status_of(err: CoreError) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn core_errors_map_to_status_codes() {
        assert_eq!(
            status_of(CoreError::InvalidConfig(ConfigError::BlankTarget)),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(CoreError::NotFound(SessionId::from("scan-x"))),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(CoreError::InvalidTransition {
                id: SessionId::from("scan-x"),
                from: "completed",
                attempted: "port_found",
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(CoreError::InvalidFinding("port 0".into())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }
}
