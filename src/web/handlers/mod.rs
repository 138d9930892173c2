//! HTTP handlers

pub mod admin;
pub mod incidents;
pub mod system;
pub mod transfers;
pub mod zones;

pub use admin::{restore, snapshot};
pub use incidents::{get_incident, incident_action, list_recent_incidents};
pub use system::{healthz, metrics, version};
pub use transfers::{create_transfer, get_transaction, list_balances, list_transactions};
pub use zones::{
    get_zone_controls, list_incidents_by_zone, list_zone_audit, list_zones, replay_spool,
    set_zone_controls, set_zone_status, spool_stats,
};

use serde::Deserialize;

/// `?limit=` query shared by the list endpoints.
#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

impl LimitQuery {
    pub fn or_default(&self, default: i64) -> i64 {
        self.limit.unwrap_or(default)
    }
}
