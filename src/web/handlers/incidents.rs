//! Incident endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde_json::json;

use super::LimitQuery;
use crate::ledger::models::{Incident, IncidentAction};
use crate::web::error::ApiError;
use crate::web::state::AppState;

/// Most recent incidents across all zones.
#[utoipa::path(
    get,
    path = "/v1/incidents",
    params(("limit" = Option<i64>, Query, description = "Max rows (default 500, max 2000)")),
    responses((status = 200, description = "Incident list")),
    tag = "Incidents"
)]
pub async fn list_recent_incidents(
    State(state): State<AppState>,
    Query(q): Query<LimitQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let incidents = state.ledger.list_recent_incidents(q.or_default(500)).await?;
    Ok(Json(json!({"incidents": incidents})))
}

/// One incident by id.
#[utoipa::path(
    get,
    path = "/v1/incidents/{incident_id}",
    params(("incident_id" = String, Path, description = "Incident id")),
    responses(
        (status = 200, description = "Incident", body = Incident),
        (status = 404, description = "Unknown incident")
    ),
    tag = "Incidents"
)]
pub async fn get_incident(
    State(state): State<AppState>,
    Path(incident_id): Path<String>,
) -> Result<Json<Incident>, ApiError> {
    let incident = state
        .ledger
        .get_incident(&incident_id)
        .await?
        .ok_or_else(|| ApiError::not_found("incident not found"))?;
    Ok(Json(incident))
}

/// Apply an operator action (ACK, ASSIGN, RESOLVE) to an incident.
#[utoipa::path(
    post,
    path = "/v1/incidents/{incident_id}/action",
    params(("incident_id" = String, Path, description = "Incident id")),
    responses(
        (status = 200, description = "Updated incident", body = Incident),
        (status = 400, description = "Missing fields"),
        (status = 409, description = "Action rejected")
    ),
    tag = "Incidents"
)]
pub async fn incident_action(
    State(state): State<AppState>,
    Path(incident_id): Path<String>,
    Json(action): Json<IncidentAction>,
) -> Result<Json<Incident>, ApiError> {
    if action.actor.is_empty() || action.action.is_empty() {
        return Err(ApiError::bad_request("missing fields"));
    }
    let incident = state
        .ledger
        .apply_incident_action(&incident_id, action)
        .await
        .map_err(|e| ApiError::conflict(e.to_string()))?;
    Ok(Json(incident))
}
