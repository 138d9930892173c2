//! HTTP control plane
//!
//! Thin layer over the ledger engine: routing, CORS, request tracing and
//! error mapping live here; every decision worth auditing lives below.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod state;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use middleware::{cors_middleware, CorsPolicy};
use state::AppState;

/// Build the full router.
pub fn build_router(state: AppState, cors: Arc<CorsPolicy>) -> Router {
    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/metrics", get(handlers::metrics))
        .route("/v1/version", get(handlers::version))
        .route("/v1/zones", get(handlers::list_zones))
        .route("/v1/transfers", post(handlers::create_transfer))
        .route("/v1/balances", get(handlers::list_balances))
        .route("/v1/transactions", get(handlers::list_transactions))
        .route(
            "/v1/transactions/{transaction_id}",
            get(handlers::get_transaction),
        )
        .route("/v1/zones/{zone_id}/status", post(handlers::set_zone_status))
        .route(
            "/v1/zones/{zone_id}/controls",
            get(handlers::get_zone_controls).post(handlers::set_zone_controls),
        )
        .route("/v1/zones/{zone_id}/spool", get(handlers::spool_stats))
        .route(
            "/v1/zones/{zone_id}/spool/replay",
            post(handlers::replay_spool),
        )
        .route("/v1/zones/{zone_id}/audit", get(handlers::list_zone_audit))
        .route(
            "/v1/zones/{zone_id}/incidents",
            get(handlers::list_incidents_by_zone),
        )
        .route("/v1/incidents", get(handlers::list_recent_incidents))
        .route("/v1/incidents/{incident_id}", get(handlers::get_incident))
        .route(
            "/v1/incidents/{incident_id}/action",
            post(handlers::incident_action),
        )
        .route("/v1/sim/snapshot", post(handlers::snapshot))
        .route("/v1/sim/restore", post(handlers::restore))
        .layer(axum::middleware::from_fn_with_state(cors, cors_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
