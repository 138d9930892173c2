//! Admin endpoints: snapshot and destructive restore
//!
//! Gated by the `X-Admin-Key` header; with no key configured the whole
//! surface answers 403.

use axum::{extract::State, http::HeaderMap, Json};
use serde_json::json;

use crate::web::error::ApiError;
use crate::web::state::AppState;

fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(key) = &state.admin_key else {
        return Err(ApiError::forbidden("admin disabled"));
    };
    let presented = headers
        .get("x-admin-key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if presented != key {
        return Err(ApiError::forbidden("forbidden"));
    }
    Ok(())
}

/// Export the simulation state.
#[utoipa::path(
    post,
    path = "/v1/sim/snapshot",
    responses(
        (status = 200, description = "Snapshot document"),
        (status = 403, description = "Admin disabled or bad key")
    ),
    tag = "Admin"
)]
pub async fn snapshot(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_admin(&state, &headers)?;
    let snap = state.ledger.snapshot().await?;
    Ok(Json(snap))
}

/// Destructively restore from a snapshot document.
#[utoipa::path(
    post,
    path = "/v1/sim/restore",
    responses(
        (status = 200, description = "Restore applied"),
        (status = 403, description = "Admin disabled or bad key"),
        (status = 500, description = "Restore failed")
    ),
    tag = "Admin"
)]
pub async fn restore(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(snap): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_admin(&state, &headers)?;
    state.ledger.restore(&snap).await?;
    Ok(Json(json!({"status": "ok"})))
}
