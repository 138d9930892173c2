//! Ledger row types
//!
//! Serialized shapes double as the API wire format, so field names here
//! are the contract the console depends on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// A logical locality with independent status and controls.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct Zone {
    pub id: String,
    pub name: String,
    pub status: String,
    pub updated_at: DateTime<Utc>,
}

/// Operator containment controls for one zone.
///
/// The row is materialized on demand; defaults are "everything open".
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct ZoneControls {
    pub zone_id: String,
    pub writes_blocked: bool,
    pub cross_zone_throttle: i32,
    pub spool_enabled: bool,
    pub updated_at: DateTime<Utc>,
}

/// Input to transfer admission.
#[derive(Debug, Clone)]
pub struct CreateTransferInput {
    pub request_id: String,
    pub payload_hash: String,
    pub from_account: String,
    pub to_account: String,
    pub amount_units: i64,
    pub zone_id: String,
    pub metadata: Value,
}

/// The applied outcome of a transfer.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub id: String,
    pub request_id: String,
    pub created_at: DateTime<Utc>,
}

/// Outcome of transfer admission: applied now, or parked in the spool.
#[derive(Debug, Clone)]
pub enum TransferOutcome {
    Applied(Transaction),
    Spooled { spool_id: String },
}

/// Transaction list row.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct TransactionRow {
    pub id: String,
    pub request_id: String,
    pub from_account: String,
    pub to_account: String,
    pub amount_units: i64,
    pub zone_id: String,
    pub created_at: DateTime<Utc>,
}

/// One leg of a transaction.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct PostingRow {
    pub account_id: String,
    pub direction: String,
    pub amount_units: i64,
}

/// Transaction detail: the row plus metadata and both postings.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TransactionDetail {
    #[serde(flatten)]
    pub txn: TransactionRow,
    pub metadata: Value,
    pub postings: Vec<PostingRow>,
}

/// Balance projection row.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct BalanceRow {
    pub account_id: String,
    pub balance_units: i64,
    pub updated_at: DateTime<Utc>,
}

/// Per-zone spool counters.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SpoolStats {
    pub zone_id: String,
    pub pending: i64,
    pub applied: i64,
    pub failed: i64,
}

/// Result of a spool replay run.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReplayResult {
    pub zone_id: String,
    pub applied: i64,
    pub failed: i64,
}

/// An incident raised by an operator action or the fraud rule.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct Incident {
    pub id: String,
    pub zone_id: String,
    pub related_txn_id: Option<String>,
    pub severity: String,
    pub status: String,
    pub title: String,
    pub details: Value,
    pub detected_at: DateTime<Utc>,
}

/// Operator action on an incident.
#[derive(Debug, Clone, Deserialize)]
pub struct IncidentAction {
    pub action: String,
    pub assignee: Option<String>,
    pub note: Option<String>,
    pub actor: String,
    pub reason: Option<String>,
}

/// One audit trail entry.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct AuditEntry {
    pub id: String,
    pub actor: String,
    pub action: String,
    pub target_type: String,
    pub target_id: String,
    pub reason: Option<String>,
    pub details: Value,
    pub created_at: DateTime<Utc>,
}

/// Zone status values accepted from operators.
pub const ZONE_STATUSES: [&str; 3] = ["OK", "DEGRADED", "DOWN"];

/// Incident actions accepted from operators.
pub const INCIDENT_ACTIONS: [&str; 3] = ["ACK", "ASSIGN", "RESOLVE"];

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_transaction_detail_flattens_row() {
        let detail = TransactionDetail {
            txn: TransactionRow {
                id: "t1".into(),
                request_id: "r1".into(),
                from_account: "a".into(),
                to_account: "b".into(),
                amount_units: 120,
                zone_id: "zone-eu".into(),
                created_at: Utc::now(),
            },
            metadata: json!({}),
            postings: vec![],
        };

        let v = serde_json::to_value(&detail).unwrap();
        // Flattened: the row fields sit next to metadata/postings.
        assert_eq!(v["id"], "t1");
        assert_eq!(v["amount_units"], 120);
        assert!(v.get("txn").is_none());
    }
}
