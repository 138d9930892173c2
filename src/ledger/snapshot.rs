//! Operator snapshot and destructive restore
//!
//! A snapshot is an operator-visible JSON document, not a backup format:
//! zones, controls, accounts with balances, incidents, spool and the
//! audit tail, each capped. Restore truncates all mutable state and
//! re-inserts from the document; the zones table itself is never
//! re-seeded, only statuses are updated.

use chrono::Utc;
use serde_json::{json, Map, Value};
use sqlx::Row;
use tracing::{info, warn};
use uuid::Uuid;

use super::error::LedgerError;
use super::models::ZONE_STATUSES;
use super::Ledger;

const SNAPSHOT_ACCOUNT_CAP: i64 = 20_000;
const SNAPSHOT_INCIDENT_CAP: i64 = 5_000;
const SNAPSHOT_SPOOL_CAP: i64 = 5_000;
const SNAPSHOT_AUDIT_CAP: i64 = 2_000;

impl Ledger {
    /// Export the simulation state as a JSON document.
    pub async fn snapshot(&self) -> Result<Value, LedgerError> {
        let mut snap = Map::new();
        snap.insert("version".into(), json!("v2"));
        snap.insert("created_at".into(), json!(Utc::now().to_rfc3339()));
        snap.insert(
            "note".into(),
            json!("Restore resets transaction history; balances/incidents/controls/spool/audit are restored."),
        );

        snap.insert("zones".into(), serde_json::to_value(self.list_zones().await?)?);

        let ctrl_rows = sqlx::query(
            r#"
            SELECT zone_id, writes_blocked, cross_zone_throttle, spool_enabled, updated_at
            FROM zone_controls ORDER BY zone_id
            "#,
        )
        .fetch_all(self.pool())
        .await?;
        let controls: Vec<Value> = ctrl_rows
            .iter()
            .map(|r| {
                json!({
                    "zone_id": r.get::<String, _>("zone_id"),
                    "writes_blocked": r.get::<bool, _>("writes_blocked"),
                    "cross_zone_throttle": r.get::<i32, _>("cross_zone_throttle"),
                    "spool_enabled": r.get::<bool, _>("spool_enabled"),
                    "updated_at": r.get::<chrono::DateTime<Utc>, _>("updated_at").to_rfc3339(),
                })
            })
            .collect();
        snap.insert("zone_controls".into(), Value::Array(controls));

        let acct_rows = sqlx::query(
            r#"
            SELECT a.id, a.zone_id, COALESCE(b.balance_units, 0) AS balance_units
            FROM accounts a
            LEFT JOIN balances b ON b.account_id = a.id
            ORDER BY a.id
            LIMIT $1
            "#,
        )
        .bind(SNAPSHOT_ACCOUNT_CAP)
        .fetch_all(self.pool())
        .await?;
        let accounts: Vec<Value> = acct_rows
            .iter()
            .map(|r| {
                json!({
                    "id": r.get::<String, _>("id"),
                    "zone_id": r.get::<String, _>("zone_id"),
                    "balance_units": r.get::<i64, _>("balance_units"),
                })
            })
            .collect();
        snap.insert("accounts".into(), Value::Array(accounts));

        snap.insert(
            "incidents".into(),
            serde_json::to_value(self.list_recent_incidents(SNAPSHOT_INCIDENT_CAP).await?)?,
        );

        let spool_rows = sqlx::query(
            r#"
            SELECT id::text AS id, request_id, payload_hash, from_account, to_account,
                   amount_units, zone_id, metadata, status, fail_reason,
                   created_at, updated_at, applied_at
            FROM spooled_transfers
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(SNAPSHOT_SPOOL_CAP)
        .fetch_all(self.pool())
        .await?;
        let spools: Vec<Value> = spool_rows
            .iter()
            .map(|r| {
                json!({
                    "id": r.get::<String, _>("id"),
                    "request_id": r.get::<String, _>("request_id"),
                    "payload_hash": r.get::<String, _>("payload_hash"),
                    "from_account": r.get::<String, _>("from_account"),
                    "to_account": r.get::<String, _>("to_account"),
                    "amount_units": r.get::<i64, _>("amount_units"),
                    "zone_id": r.get::<String, _>("zone_id"),
                    "metadata": r.get::<Value, _>("metadata"),
                    "status": r.get::<String, _>("status"),
                    "fail_reason": r.get::<Option<String>, _>("fail_reason"),
                    "created_at": r.get::<chrono::DateTime<Utc>, _>("created_at").to_rfc3339(),
                    "updated_at": r.get::<chrono::DateTime<Utc>, _>("updated_at").to_rfc3339(),
                    "applied_at": r
                        .get::<Option<chrono::DateTime<Utc>>, _>("applied_at")
                        .map(|t| t.to_rfc3339()),
                })
            })
            .collect();
        snap.insert("spooled_transfers".into(), Value::Array(spools));

        snap.insert(
            "audit_log".into(),
            serde_json::to_value(
                self.list_audit_tail(SNAPSHOT_AUDIT_CAP).await?,
            )?,
        );

        Ok(Value::Object(snap))
    }

    async fn list_audit_tail(
        &self,
        limit: i64,
    ) -> Result<Vec<super::models::AuditEntry>, LedgerError> {
        let rows = sqlx::query_as::<_, super::models::AuditEntry>(
            r#"
            SELECT id::text AS id, actor, action, target_type, target_id, reason, details,
                   created_at
            FROM audit_log
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    /// Destructively restore from a snapshot document.
    ///
    /// Runs as one transaction: truncate every mutable table, then
    /// re-insert. Unknown or malformed entries are skipped rather than
    /// aborting the whole restore.
    pub async fn restore(&self, snap: &Value) -> Result<(), LedgerError> {
        let mut tx = self.pool().begin().await?;

        for table in [
            "postings",
            "transactions",
            "balances",
            "accounts",
            "incidents",
            "outbox_events",
            "inbox_events",
            "audit_log",
            "spooled_transfers",
            "zone_controls",
        ] {
            sqlx::query(&format!("TRUNCATE TABLE {table} RESTART IDENTITY CASCADE"))
                .execute(&mut *tx)
                .await?;
        }

        // Zones are deployment state: update statuses only.
        for zone in iter_objects(snap, "zones") {
            let id = str_field(zone, "id");
            let status = str_field(zone, "status");
            if !id.is_empty() && ZONE_STATUSES.contains(&status) {
                sqlx::query("UPDATE zones SET status = $2, updated_at = now() WHERE id = $1")
                    .bind(id)
                    .bind(status)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        let controls = snap.get("zone_controls").and_then(Value::as_array);
        match controls {
            Some(items) => {
                for c in items.iter().filter_map(Value::as_object) {
                    let zone_id = str_field(c, "zone_id");
                    if zone_id.is_empty() {
                        continue;
                    }
                    sqlx::query(
                        r#"
                        INSERT INTO zone_controls
                            (zone_id, writes_blocked, cross_zone_throttle, spool_enabled, updated_at)
                        VALUES ($1, $2, $3, $4, now())
                        ON CONFLICT (zone_id) DO UPDATE
                            SET writes_blocked = EXCLUDED.writes_blocked,
                                cross_zone_throttle = EXCLUDED.cross_zone_throttle,
                                spool_enabled = EXCLUDED.spool_enabled,
                                updated_at = now()
                        "#,
                    )
                    .bind(zone_id)
                    .bind(bool_field(c, "writes_blocked"))
                    .bind(i64_field(c, "cross_zone_throttle") as i32)
                    .bind(bool_field(c, "spool_enabled"))
                    .execute(&mut *tx)
                    .await?;
                }
            }
            None => {
                // Seed defaults when the snapshot predates controls.
                sqlx::query(
                    "INSERT INTO zone_controls (zone_id) SELECT id FROM zones ON CONFLICT DO NOTHING",
                )
                .execute(&mut *tx)
                .await?;
            }
        }

        for acct in iter_objects(snap, "accounts") {
            let id = str_field(acct, "id");
            if id.is_empty() {
                continue;
            }
            let zone_id = match str_field(acct, "zone_id") {
                "" => "zone-eu",
                z => z,
            };
            sqlx::query("INSERT INTO accounts (id, zone_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
                .bind(id)
                .bind(zone_id)
                .execute(&mut *tx)
                .await?;
            sqlx::query(
                r#"
                INSERT INTO balances (account_id, balance_units, updated_at)
                VALUES ($1, $2, now())
                ON CONFLICT (account_id) DO UPDATE
                    SET balance_units = EXCLUDED.balance_units, updated_at = now()
                "#,
            )
            .bind(id)
            .bind(i64_field(acct, "balance_units"))
            .execute(&mut *tx)
            .await?;
        }

        for inc in iter_objects(snap, "incidents") {
            let zone_id = str_field(inc, "zone_id");
            let title = str_field(inc, "title");
            if zone_id.is_empty() || title.is_empty() {
                continue;
            }
            let severity = match str_field(inc, "severity") {
                "" => "INFO",
                s => s,
            };
            let status = match str_field(inc, "status") {
                "" => "OPEN",
                s => s,
            };
            let related = inc
                .get("related_txn_id")
                .and_then(Value::as_str)
                .and_then(|s| Uuid::parse_str(s).ok());
            let details = inc.get("details").cloned().unwrap_or(json!({}));

            sqlx::query(
                r#"
                INSERT INTO incidents (zone_id, related_txn_id, severity, status, title, details)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(zone_id)
            .bind(related)
            .bind(severity)
            .bind(status)
            .bind(title)
            .bind(details)
            .execute(&mut *tx)
            .await?;
        }

        for sp in iter_objects(snap, "spooled_transfers") {
            let request_id = str_field(sp, "request_id");
            if request_id.is_empty() {
                continue;
            }
            let status = match str_field(sp, "status") {
                "" => "PENDING",
                s => s,
            };
            let fail_reason = sp
                .get("fail_reason")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty());
            let metadata = sp.get("metadata").cloned().unwrap_or(json!({}));

            sqlx::query(
                r#"
                INSERT INTO spooled_transfers
                    (request_id, payload_hash, from_account, to_account, amount_units,
                     zone_id, metadata, status, fail_reason, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, now())
                ON CONFLICT (request_id) DO NOTHING
                "#,
            )
            .bind(request_id)
            .bind(str_field(sp, "payload_hash"))
            .bind(str_field(sp, "from_account"))
            .bind(str_field(sp, "to_account"))
            .bind(i64_field(sp, "amount_units"))
            .bind(str_field(sp, "zone_id"))
            .bind(metadata)
            .bind(status)
            .bind(fail_reason)
            .execute(&mut *tx)
            .await?;
        }

        let mut skipped_audit = 0usize;
        for entry in iter_objects(snap, "audit_log") {
            let actor = str_field(entry, "actor");
            let action = str_field(entry, "action");
            let target_type = str_field(entry, "target_type");
            let target_id = str_field(entry, "target_id");
            if actor.is_empty() || action.is_empty() || target_type.is_empty() || target_id.is_empty()
            {
                skipped_audit += 1;
                continue;
            }
            let reason = entry
                .get("reason")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty());
            let details = entry.get("details").cloned().unwrap_or(json!({}));

            sqlx::query(
                r#"
                INSERT INTO audit_log (actor, action, target_type, target_id, reason, details)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(actor)
            .bind(action)
            .bind(target_type)
            .bind(target_id)
            .bind(reason)
            .bind(details)
            .execute(&mut *tx)
            .await?;
        }
        if skipped_audit > 0 {
            warn!(skipped = skipped_audit, "restore skipped malformed audit entries");
        }

        tx.commit().await?;
        info!("restore completed");
        Ok(())
    }
}

fn iter_objects<'a>(
    snap: &'a Value,
    key: &str,
) -> impl Iterator<Item = &'a Map<String, Value>> + 'a {
    snap.get(key)
        .and_then(Value::as_array)
        .map(|a| a.as_slice())
        .unwrap_or(&[])
        .iter()
        .filter_map(Value::as_object)
}

fn str_field<'a>(obj: &'a Map<String, Value>, key: &str) -> &'a str {
    obj.get(key).and_then(Value::as_str).unwrap_or("")
}

fn bool_field(obj: &Map<String, Value>, key: &str) -> bool {
    obj.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn i64_field(obj: &Map<String, Value>, key: &str) -> i64 {
    obj.get(key).and_then(Value::as_i64).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iter_objects_tolerates_missing_and_mixed() {
        let snap = json!({"zones": [{"id": "zone-eu"}, 42, "x", {"id": "zone-na"}]});
        assert_eq!(iter_objects(&snap, "zones").count(), 2);
        assert_eq!(iter_objects(&snap, "absent").count(), 0);
    }

    #[test]
    fn test_field_accessors_defaults() {
        let obj = json!({"s": "v", "b": true, "n": 7});
        let obj = obj.as_object().unwrap();
        assert_eq!(str_field(obj, "s"), "v");
        assert_eq!(str_field(obj, "missing"), "");
        assert!(bool_field(obj, "b"));
        assert!(!bool_field(obj, "missing"));
        assert_eq!(i64_field(obj, "n"), 7);
        assert_eq!(i64_field(obj, "missing"), 0);
    }
}
