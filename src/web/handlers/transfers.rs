//! Transfer admission and ledger read endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

use super::LimitQuery;
use crate::hash::canonical_json_hash;
use crate::ledger::{CreateTransferInput, TransferOutcome};
use crate::web::error::ApiError;
use crate::web::state::AppState;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateTransferRequest {
    pub request_id: String,
    pub from_account: String,
    pub to_account: String,
    pub amount_units: i64,
    pub zone_id: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TransferAppliedResponse {
    /// Always "APPLIED".
    pub status: &'static str,
    pub transaction_id: String,
    pub request_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TransferSpooledResponse {
    /// Always "SPOOLED".
    pub status: &'static str,
    pub spool_id: String,
    pub request_id: String,
}

/// Admit a transfer: apply it, spool it, or reject it.
#[utoipa::path(
    post,
    path = "/v1/transfers",
    request_body = CreateTransferRequest,
    responses(
        (status = 200, description = "Transfer applied", body = TransferAppliedResponse),
        (status = 202, description = "Transfer spooled", body = TransferSpooledResponse),
        (status = 400, description = "Missing or invalid fields"),
        (status = 409, description = "Idempotency conflict"),
        (status = 503, description = "Zone down or blocked")
    ),
    tag = "Transfers"
)]
pub async fn create_transfer(
    State(state): State<AppState>,
    Json(mut req): Json<CreateTransferRequest>,
) -> Result<Response, ApiError> {
    if req.request_id.is_empty()
        || req.from_account.is_empty()
        || req.to_account.is_empty()
        || req.zone_id.is_empty()
        || req.amount_units <= 0
    {
        return Err(ApiError::bad_request("missing/invalid fields"));
    }
    if req.metadata.is_null() {
        req.metadata = json!({});
    }

    // The fingerprint covers the whole request body, so a retry with any
    // field changed is a conflict, not a replay.
    let body = serde_json::to_value(&req)
        .map_err(|e| ApiError::internal(format!("hash error: {e}")))?;
    let payload_hash = canonical_json_hash(&body)
        .map_err(|e| ApiError::internal(format!("hash error: {e}")))?;

    let outcome = state
        .ledger
        .create_transfer(CreateTransferInput {
            request_id: req.request_id.clone(),
            payload_hash,
            from_account: req.from_account,
            to_account: req.to_account,
            amount_units: req.amount_units,
            zone_id: req.zone_id,
            metadata: req.metadata,
        })
        .await?;

    match outcome {
        TransferOutcome::Applied(txn) => {
            state.metrics.transfers_applied_total.inc();
            Ok((
                StatusCode::OK,
                Json(TransferAppliedResponse {
                    status: "APPLIED",
                    transaction_id: txn.id,
                    request_id: txn.request_id,
                    created_at: txn.created_at,
                }),
            )
                .into_response())
        }
        TransferOutcome::Spooled { spool_id } => {
            state.metrics.transfers_spooled_total.inc();
            Ok((
                StatusCode::ACCEPTED,
                Json(TransferSpooledResponse {
                    status: "SPOOLED",
                    spool_id,
                    request_id: req.request_id,
                }),
            )
                .into_response())
        }
    }
}

/// Balance projections.
#[utoipa::path(
    get,
    path = "/v1/balances",
    params(("limit" = Option<i64>, Query, description = "Max rows (default 100, max 500)")),
    responses((status = 200, description = "Balance list")),
    tag = "Ledger"
)]
pub async fn list_balances(
    State(state): State<AppState>,
    Query(q): Query<LimitQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let rows = state.ledger.list_balances(q.or_default(100)).await?;
    Ok(Json(json!({"balances": rows})))
}

/// Recent transactions.
#[utoipa::path(
    get,
    path = "/v1/transactions",
    params(("limit" = Option<i64>, Query, description = "Max rows (default 100, max 500)")),
    responses((status = 200, description = "Transaction list")),
    tag = "Ledger"
)]
pub async fn list_transactions(
    State(state): State<AppState>,
    Query(q): Query<LimitQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let rows = state.ledger.list_transactions(q.or_default(100)).await?;
    Ok(Json(json!({"transactions": rows})))
}

/// One transaction with its postings.
#[utoipa::path(
    get,
    path = "/v1/transactions/{transaction_id}",
    params(("transaction_id" = String, Path, description = "Transaction id")),
    responses(
        (status = 200, description = "Transaction detail"),
        (status = 404, description = "Unknown transaction")
    ),
    tag = "Ledger"
)]
pub async fn get_transaction(
    State(state): State<AppState>,
    Path(transaction_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let detail = state
        .ledger
        .get_transaction(&transaction_id)
        .await?
        .ok_or_else(|| ApiError::not_found("transaction not found"))?;
    Ok(Json(serde_json::to_value(detail).map_err(|e| {
        ApiError::internal(e.to_string())
    })?))
}
