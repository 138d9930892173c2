//! Health, metrics and version endpoints

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use prometheus::Encoder;

use crate::version::{version_info, VersionInfo};
use crate::web::state::AppState;

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/healthz",
    responses((status = 200, description = "Process is up")),
    tag = "System"
)]
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Prometheus text exposition.
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let families = state.registry.gather();
    let mut buf = Vec::new();
    let encoder = prometheus::TextEncoder::new();
    if let Err(e) = encoder.encode(&families, &mut buf) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("metrics encode error: {e}"),
        );
    }
    (
        StatusCode::OK,
        String::from_utf8_lossy(&buf).into_owned(),
    )
}

/// Build information.
#[utoipa::path(
    get,
    path = "/v1/version",
    responses((status = 200, description = "Build info", body = VersionInfo)),
    tag = "System"
)]
pub async fn version() -> Json<VersionInfo> {
    Json(version_info())
}
