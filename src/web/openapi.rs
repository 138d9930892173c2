//! OpenAPI document for the control plane

use utoipa::OpenApi;

use crate::ledger::models::{Incident, ReplayResult, SpoolStats, Zone, ZoneControls};
use crate::version::VersionInfo;
use crate::web::handlers::transfers::{
    CreateTransferRequest, TransferAppliedResponse, TransferSpooledResponse,
};
use crate::web::handlers::zones::{
    ReplaySpoolRequest, SetZoneControlsRequest, SetZoneStatusRequest,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "time-ledger-sim",
        description = "Zone-aware double-entry ledger simulator for a time-currency"
    ),
    paths(
        crate::web::handlers::system::healthz,
        crate::web::handlers::system::version,
        crate::web::handlers::transfers::create_transfer,
        crate::web::handlers::transfers::list_balances,
        crate::web::handlers::transfers::list_transactions,
        crate::web::handlers::transfers::get_transaction,
        crate::web::handlers::zones::list_zones,
        crate::web::handlers::zones::set_zone_status,
        crate::web::handlers::zones::get_zone_controls,
        crate::web::handlers::zones::set_zone_controls,
        crate::web::handlers::zones::spool_stats,
        crate::web::handlers::zones::replay_spool,
        crate::web::handlers::zones::list_zone_audit,
        crate::web::handlers::zones::list_incidents_by_zone,
        crate::web::handlers::incidents::list_recent_incidents,
        crate::web::handlers::incidents::get_incident,
        crate::web::handlers::incidents::incident_action,
        crate::web::handlers::admin::snapshot,
        crate::web::handlers::admin::restore,
    ),
    components(schemas(
        Zone,
        ZoneControls,
        Incident,
        SpoolStats,
        ReplayResult,
        VersionInfo,
        CreateTransferRequest,
        TransferAppliedResponse,
        TransferSpooledResponse,
        SetZoneStatusRequest,
        SetZoneControlsRequest,
        ReplaySpoolRequest,
    )),
    tags(
        (name = "Transfers", description = "Transfer admission"),
        (name = "Ledger", description = "Balances and transactions"),
        (name = "Zones", description = "Zone status, controls and audit"),
        (name = "Spool", description = "Containment spool and replay"),
        (name = "Incidents", description = "Incident lifecycle"),
        (name = "Admin", description = "Snapshot and restore"),
        (name = "System", description = "Health, metrics and build info"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_document_builds() {
        let doc = ApiDoc::openapi();
        let json = doc.to_json().unwrap();
        assert!(json.contains("/v1/transfers"));
        assert!(json.contains("/v1/zones/{zone_id}/spool/replay"));
    }
}
