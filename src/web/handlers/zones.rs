//! Zone status, controls, spool and audit endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;

use super::LimitQuery;
use crate::ledger::models::{ReplayResult, SpoolStats, Zone, ZoneControls};
use crate::web::error::ApiError;
use crate::web::state::AppState;

/// All zones with their current status.
#[utoipa::path(
    get,
    path = "/v1/zones",
    responses((status = 200, description = "Zone list", body = [Zone])),
    tag = "Zones"
)]
pub async fn list_zones(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let zones = state.ledger.list_zones().await?;
    Ok(Json(json!({"zones": zones})))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetZoneStatusRequest {
    pub status: String,
    pub actor: String,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Mark a zone OK, DEGRADED or DOWN.
#[utoipa::path(
    post,
    path = "/v1/zones/{zone_id}/status",
    params(("zone_id" = String, Path, description = "Zone id")),
    request_body = SetZoneStatusRequest,
    responses(
        (status = 200, description = "Updated zone", body = Zone),
        (status = 400, description = "Invalid status or missing actor")
    ),
    tag = "Zones"
)]
pub async fn set_zone_status(
    State(state): State<AppState>,
    Path(zone_id): Path<String>,
    Json(req): Json<SetZoneStatusRequest>,
) -> Result<Json<Zone>, ApiError> {
    if req.status.is_empty() || req.actor.is_empty() {
        return Err(ApiError::bad_request("missing fields"));
    }
    let zone = state
        .ledger
        .set_zone_status(&zone_id, &req.status, &req.actor, req.reason.as_deref())
        .await?;
    Ok(Json(zone))
}

/// Current containment controls for a zone.
#[utoipa::path(
    get,
    path = "/v1/zones/{zone_id}/controls",
    params(("zone_id" = String, Path, description = "Zone id")),
    responses((status = 200, description = "Zone controls", body = ZoneControls)),
    tag = "Zones"
)]
pub async fn get_zone_controls(
    State(state): State<AppState>,
    Path(zone_id): Path<String>,
) -> Result<Json<ZoneControls>, ApiError> {
    let controls = state.ledger.get_zone_controls(&zone_id).await?;
    Ok(Json(controls))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetZoneControlsRequest {
    #[serde(default)]
    pub writes_blocked: bool,
    #[serde(default = "default_throttle")]
    pub cross_zone_throttle: i32,
    #[serde(default)]
    pub spool_enabled: bool,
    pub actor: String,
    #[serde(default)]
    pub reason: Option<String>,
}

fn default_throttle() -> i32 {
    100
}

/// Replace a zone's containment controls.
#[utoipa::path(
    post,
    path = "/v1/zones/{zone_id}/controls",
    params(("zone_id" = String, Path, description = "Zone id")),
    request_body = SetZoneControlsRequest,
    responses(
        (status = 200, description = "Updated controls", body = ZoneControls),
        (status = 400, description = "Invalid throttle or missing actor")
    ),
    tag = "Zones"
)]
pub async fn set_zone_controls(
    State(state): State<AppState>,
    Path(zone_id): Path<String>,
    Json(req): Json<SetZoneControlsRequest>,
) -> Result<Json<ZoneControls>, ApiError> {
    if req.actor.is_empty() {
        return Err(ApiError::bad_request("missing fields"));
    }
    let controls = state
        .ledger
        .set_zone_controls(
            &zone_id,
            req.writes_blocked,
            req.cross_zone_throttle,
            req.spool_enabled,
            &req.actor,
            req.reason.as_deref(),
        )
        .await?;
    Ok(Json(controls))
}

/// Spool counters for a zone.
#[utoipa::path(
    get,
    path = "/v1/zones/{zone_id}/spool",
    params(("zone_id" = String, Path, description = "Zone id")),
    responses((status = 200, description = "Spool counters", body = SpoolStats)),
    tag = "Spool"
)]
pub async fn spool_stats(
    State(state): State<AppState>,
    Path(zone_id): Path<String>,
) -> Result<Json<SpoolStats>, ApiError> {
    let stats = state.ledger.spool_stats(&zone_id).await?;
    Ok(Json(stats))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReplaySpoolRequest {
    #[serde(default)]
    pub limit: i64,
    pub actor: String,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Replay pending spooled transfers for a recovered zone.
#[utoipa::path(
    post,
    path = "/v1/zones/{zone_id}/spool/replay",
    params(("zone_id" = String, Path, description = "Zone id")),
    request_body = ReplaySpoolRequest,
    responses(
        (status = 200, description = "Replay summary", body = ReplayResult),
        (status = 409, description = "Zone not ready for replay")
    ),
    tag = "Spool"
)]
pub async fn replay_spool(
    State(state): State<AppState>,
    Path(zone_id): Path<String>,
    Json(req): Json<ReplaySpoolRequest>,
) -> Result<Json<ReplayResult>, ApiError> {
    if req.actor.is_empty() {
        return Err(ApiError::bad_request("missing fields"));
    }
    let result = state
        .ledger
        .replay_spool(&zone_id, req.limit, &req.actor, req.reason.as_deref())
        .await?;
    Ok(Json(result))
}

/// Audit trail for a zone.
#[utoipa::path(
    get,
    path = "/v1/zones/{zone_id}/audit",
    params(
        ("zone_id" = String, Path, description = "Zone id"),
        ("limit" = Option<i64>, Query, description = "Max rows (default 100, max 500)")
    ),
    responses((status = 200, description = "Audit entries")),
    tag = "Zones"
)]
pub async fn list_zone_audit(
    State(state): State<AppState>,
    Path(zone_id): Path<String>,
    Query(q): Query<LimitQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let entries = state
        .ledger
        .list_audit_for_zone(&zone_id, q.or_default(100))
        .await?;
    Ok(Json(json!({"audit": entries})))
}

/// Incidents scoped to a zone.
#[utoipa::path(
    get,
    path = "/v1/zones/{zone_id}/incidents",
    params(("zone_id" = String, Path, description = "Zone id")),
    responses((status = 200, description = "Incident list")),
    tag = "Incidents"
)]
pub async fn list_incidents_by_zone(
    State(state): State<AppState>,
    Path(zone_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let incidents = state.ledger.list_incidents_by_zone(&zone_id).await?;
    Ok(Json(json!({"incidents": incidents})))
}
