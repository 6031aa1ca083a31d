// ---------------------------------------------------------------------------
// Route registration
// ---------------------------------------------------------------------------

mod callbacks;
mod scans;
mod system;

use std::sync::Arc;

use axum::Router;
use axum::http::{HeaderValue, Method, header};
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;

use crate::state::AppState;

/// Request bodies are scan requests and single findings.
const BODY_LIMIT: usize = 2 * 1024 * 1024;

const DEV_ORIGINS: [&str; 3] = [
    "http://localhost:3000",
    "http://localhost:5173", // Vite dev server
    "http://127.0.0.1:5173",
];

pub fn build_router(state: Arc<AppState>) -> Router {
    let system_routes = Router::new()
        .route("/api/system/health", get(system::health_check))
        .route("/api/system/status", get(system::status));

    let operator_routes = Router::new()
        .route("/api/scans", post(scans::create_scan).get(scans::list_scans))
        .route("/api/scans/selected", get(scans::get_selected))
        .route(
            "/api/scans/{id}",
            get(scans::get_scan).delete(scans::delete_scan),
        )
        .route("/api/scans/{id}/select", post(scans::select_scan))
        .route("/api/scans/{id}/stop", post(scans::stop_scan));

    let executor_routes = Router::new()
        .route("/api/scans/{id}/start", post(callbacks::accepted))
        .route("/api/scans/{id}/ports", post(callbacks::port_found))
        .route(
            "/api/scans/{id}/vulnerabilities",
            post(callbacks::vulnerability_found),
        )
        .route("/api/scans/{id}/host", post(callbacks::host_info))
        .route("/api/scans/{id}/complete", post(callbacks::completed))
        .route("/api/scans/{id}/fail", post(callbacks::failed));

    // CORS: localhost dev origins only. Anything else should sit behind a
    // reverse proxy that handles CORS itself.
    let cors = CorsLayer::new()
        .allow_origin(DEV_ORIGINS.map(HeaderValue::from_static))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(std::time::Duration::from_secs(3600));

    system_routes
        .merge(operator_routes)
        .merge(executor_routes)
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .with_state(state)
}
