//! Transfer admission, apply, spool and replay
//!
//! Admission runs as one database transaction: gate on zone status and
//! controls, probe both idempotency tables, then either apply the
//! double-entry write set (transaction + postings + balances + outbox
//! row) or park the request in the spool. The outbox row commits with
//! the transfer or not at all.

use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::{Postgres, Row, Transaction as PgTx};
use tracing::{debug, info};

use super::error::LedgerError;
use super::models::{
    CreateTransferInput, ReplayResult, SpoolStats, Transaction, TransferOutcome, ZoneControls,
};
use super::Ledger;
use crate::hash::fnv1a32_percent;

/// Event type written to the outbox for every applied transfer.
pub const EVENT_TRANSFER_POSTED: &str = "TRANSFER_POSTED";

/// Sentinel event id written at apply time and rewritten by the
/// publisher to the outbox row id. Keeps the apply path free of a second
/// id generation.
pub const EVENT_ID_SENTINEL: &str = "generated_by_db";

impl Ledger {
    /// Admit a transfer.
    ///
    /// Outcomes:
    /// - `Applied` with the (possibly pre-existing) transaction,
    /// - `Spooled` with the (possibly pre-existing) spool row id,
    /// - a typed admission error.
    pub async fn create_transfer(
        &self,
        input: CreateTransferInput,
    ) -> Result<TransferOutcome, LedgerError> {
        let mut tx = self.pool().begin().await?;

        // Zone gate + controls.
        let status = Self::zone_status_tx(&mut tx, &input.zone_id).await?;
        let controls = Self::controls_tx(&mut tx, &input.zone_id).await?;
        let blocked_reason = blocked_reason(&status, &controls, &input.request_id);

        // Idempotency probe A: an applied transaction wins over everything,
        // including a currently-enabled spool.
        let existing = sqlx::query(
            "SELECT id::text AS id, payload_hash, created_at FROM transactions WHERE request_id = $1",
        )
        .bind(&input.request_id)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(row) = existing {
            let payload_hash: String = row.get("payload_hash");
            if payload_hash != input.payload_hash {
                return Err(LedgerError::IdempotencyConflict);
            }
            let txn = Transaction {
                id: row.get("id"),
                request_id: input.request_id.clone(),
                created_at: row.get("created_at"),
            };
            tx.commit().await?;
            debug!(request_id = %txn.request_id, transaction_id = %txn.id, "idempotent replayed apply");
            return Ok(TransferOutcome::Applied(txn));
        }

        // Idempotency probe B: a previously spooled request stays spooled.
        let existing_spool = sqlx::query(
            "SELECT id::text AS id, payload_hash FROM spooled_transfers WHERE request_id = $1",
        )
        .bind(&input.request_id)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(row) = existing_spool {
            let payload_hash: String = row.get("payload_hash");
            if payload_hash != input.payload_hash {
                return Err(LedgerError::IdempotencyConflict);
            }
            let spool_id: String = row.get("id");
            tx.commit().await?;
            debug!(request_id = %input.request_id, spool_id = %spool_id, "idempotent spool hit");
            return Ok(TransferOutcome::Spooled { spool_id });
        }

        if let Some(reason) = blocked_reason {
            if controls.spool_enabled {
                let spool_id = Self::spool_transfer_tx(&mut tx, &input, reason).await?;
                tx.commit().await?;
                info!(request_id = %input.request_id, spool_id = %spool_id, reason, "transfer spooled");
                return Ok(TransferOutcome::Spooled { spool_id });
            }
            return Err(if status == "DOWN" {
                LedgerError::ZoneDown
            } else {
                LedgerError::ZoneBlocked
            });
        }

        // All accounts live in the initiating zone (simulation rule).
        Self::ensure_account_tx(&mut tx, &input.from_account, &input.zone_id).await?;
        Self::ensure_account_tx(&mut tx, &input.to_account, &input.zone_id).await?;

        let txn = Self::apply_transfer_tx(&mut tx, &input).await?;
        tx.commit().await?;

        info!(
            request_id = %txn.request_id,
            transaction_id = %txn.id,
            amount_units = input.amount_units,
            zone_id = %input.zone_id,
            "transfer applied"
        );
        Ok(TransferOutcome::Applied(txn))
    }

    /// Apply a transfer without zone gating; used by spool replay.
    ///
    /// Idempotency against the transactions table is still enforced.
    pub async fn apply_transfer_bypass(
        &self,
        input: &CreateTransferInput,
    ) -> Result<Transaction, LedgerError> {
        let mut tx = self.pool().begin().await?;

        let existing = sqlx::query(
            "SELECT id::text AS id, payload_hash, created_at FROM transactions WHERE request_id = $1",
        )
        .bind(&input.request_id)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(row) = existing {
            let payload_hash: String = row.get("payload_hash");
            if payload_hash != input.payload_hash {
                return Err(LedgerError::IdempotencyConflict);
            }
            let txn = Transaction {
                id: row.get("id"),
                request_id: input.request_id.clone(),
                created_at: row.get("created_at"),
            };
            tx.commit().await?;
            return Ok(txn);
        }

        Self::ensure_account_tx(&mut tx, &input.from_account, &input.zone_id).await?;
        Self::ensure_account_tx(&mut tx, &input.to_account, &input.zone_id).await?;

        let txn = Self::apply_transfer_tx(&mut tx, input).await?;
        tx.commit().await?;
        Ok(txn)
    }

    /// Replay pending spool rows for a recovered zone, oldest first.
    pub async fn replay_spool(
        &self,
        zone_id: &str,
        limit: i64,
        actor: &str,
        reason: Option<&str>,
    ) -> Result<ReplayResult, LedgerError> {
        let limit = if limit <= 0 || limit > 500 { 50 } else { limit };

        // A zone still contained gets no replay.
        let status: Option<String> = sqlx::query_scalar("SELECT status FROM zones WHERE id = $1")
            .bind(zone_id)
            .fetch_optional(self.pool())
            .await?;
        let status = status.ok_or_else(|| LedgerError::ZoneUnknown(zone_id.to_string()))?;
        let controls = self.get_zone_controls(zone_id).await?;
        if status == "DOWN" || controls.writes_blocked || controls.cross_zone_throttle == 0 {
            return Err(LedgerError::NotReady);
        }

        let rows = sqlx::query(
            r#"
            SELECT id::text AS id, request_id, payload_hash, from_account, to_account,
                   amount_units, zone_id, metadata
            FROM spooled_transfers
            WHERE zone_id = $1 AND status = 'PENDING'
            ORDER BY created_at ASC
            LIMIT $2
            "#,
        )
        .bind(zone_id)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;

        let mut result = ReplayResult {
            zone_id: zone_id.to_string(),
            applied: 0,
            failed: 0,
        };

        for row in rows {
            let spool_id: String = row.get("id");
            let input = CreateTransferInput {
                request_id: row.get("request_id"),
                payload_hash: row.get("payload_hash"),
                from_account: row.get("from_account"),
                to_account: row.get("to_account"),
                amount_units: row.get("amount_units"),
                zone_id: row.get("zone_id"),
                metadata: row.get("metadata"),
            };

            match self.apply_transfer_bypass(&input).await {
                Ok(txn) => {
                    result.applied += 1;
                    sqlx::query(
                        r#"
                        UPDATE spooled_transfers
                        SET status = 'APPLIED', updated_at = now(), applied_at = now(),
                            fail_reason = NULL
                        WHERE id = $1::uuid
                        "#,
                    )
                    .bind(&spool_id)
                    .execute(self.pool())
                    .await?;
                    debug!(spool_id = %spool_id, transaction_id = %txn.id, "spool row applied");
                }
                Err(e) => {
                    result.failed += 1;
                    sqlx::query(
                        r#"
                        UPDATE spooled_transfers
                        SET status = 'FAILED', updated_at = now(), fail_reason = $2
                        WHERE id = $1::uuid
                        "#,
                    )
                    .bind(&spool_id)
                    .bind(e.to_string())
                    .execute(self.pool())
                    .await?;
                }
            }
        }

        let mut tx = self.pool().begin().await?;
        Self::audit_tx(
            &mut tx,
            actor,
            "REPLAY_SPOOL",
            "zone",
            zone_id,
            reason,
            json!({"applied": result.applied, "failed": result.failed, "limit": limit}),
        )
        .await?;
        tx.commit().await?;

        info!(
            zone_id,
            applied = result.applied,
            failed = result.failed,
            "spool replay finished"
        );
        Ok(result)
    }

    /// Pending/applied/failed counters for one zone's spool.
    pub async fn spool_stats(&self, zone_id: &str) -> Result<SpoolStats, LedgerError> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE status = 'PENDING') AS pending,
                COUNT(*) FILTER (WHERE status = 'APPLIED') AS applied,
                COUNT(*) FILTER (WHERE status = 'FAILED') AS failed
            FROM spooled_transfers
            WHERE zone_id = $1
            "#,
        )
        .bind(zone_id)
        .fetch_one(self.pool())
        .await?;

        Ok(SpoolStats {
            zone_id: zone_id.to_string(),
            pending: row.get("pending"),
            applied: row.get("applied"),
            failed: row.get("failed"),
        })
    }

    // --- transaction-scoped helpers ---

    pub(crate) async fn zone_status_tx(
        tx: &mut PgTx<'_, Postgres>,
        zone_id: &str,
    ) -> Result<String, LedgerError> {
        sqlx::query_scalar("SELECT status FROM zones WHERE id = $1")
            .bind(zone_id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| LedgerError::ZoneUnknown(zone_id.to_string()))
    }

    pub(crate) async fn controls_tx(
        tx: &mut PgTx<'_, Postgres>,
        zone_id: &str,
    ) -> Result<ZoneControls, LedgerError> {
        sqlx::query("INSERT INTO zone_controls (zone_id) VALUES ($1) ON CONFLICT DO NOTHING")
            .bind(zone_id)
            .execute(&mut **tx)
            .await?;

        let controls = sqlx::query_as::<_, ZoneControls>(
            r#"
            SELECT zone_id, writes_blocked, cross_zone_throttle, spool_enabled, updated_at
            FROM zone_controls
            WHERE zone_id = $1
            "#,
        )
        .bind(zone_id)
        .fetch_one(&mut **tx)
        .await?;

        Ok(controls)
    }

    async fn ensure_account_tx(
        tx: &mut PgTx<'_, Postgres>,
        account_id: &str,
        zone_id: &str,
    ) -> Result<(), LedgerError> {
        sqlx::query("INSERT INTO accounts (id, zone_id) VALUES ($1, $2) ON CONFLICT (id) DO NOTHING")
            .bind(account_id)
            .bind(zone_id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// The double-entry write set, all-or-nothing with the caller's tx.
    async fn apply_transfer_tx(
        tx: &mut PgTx<'_, Postgres>,
        input: &CreateTransferInput,
    ) -> Result<Transaction, LedgerError> {
        let row = sqlx::query(
            r#"
            INSERT INTO transactions
                (request_id, payload_hash, from_account, to_account, amount_units, zone_id, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id::text AS id, created_at
            "#,
        )
        .bind(&input.request_id)
        .bind(&input.payload_hash)
        .bind(&input.from_account)
        .bind(&input.to_account)
        .bind(input.amount_units)
        .bind(&input.zone_id)
        .bind(&input.metadata)
        .fetch_one(&mut **tx)
        .await?;

        let txn_id: String = row.get("id");
        let created_at: DateTime<Utc> = row.get("created_at");

        sqlx::query(
            r#"
            INSERT INTO postings (txn_id, account_id, direction, amount_units)
            VALUES ($1::uuid, $2, 'DEBIT', $3),
                   ($1::uuid, $4, 'CREDIT', $3)
            "#,
        )
        .bind(&txn_id)
        .bind(&input.from_account)
        .bind(input.amount_units)
        .bind(&input.to_account)
        .execute(&mut **tx)
        .await?;

        // Balance projection; negatives allowed in the simulation.
        for (account, delta) in [
            (&input.from_account, -input.amount_units),
            (&input.to_account, input.amount_units),
        ] {
            sqlx::query(
                r#"
                INSERT INTO balances (account_id, balance_units, updated_at)
                VALUES ($1, $2, now())
                ON CONFLICT (account_id) DO UPDATE
                    SET balance_units = balances.balance_units + EXCLUDED.balance_units,
                        updated_at = now()
                "#,
            )
            .bind(account)
            .bind(delta)
            .execute(&mut **tx)
            .await?;
        }

        // Transactional outbox row; drained to the event stream later.
        let payload = json!({
            "event_id": EVENT_ID_SENTINEL,
            "transaction_id": txn_id,
            "zone_id": input.zone_id,
            "amount_units": input.amount_units,
            "created_at": created_at.to_rfc3339(),
        });
        sqlx::query(
            r#"
            INSERT INTO outbox_events (event_type, aggregate_type, aggregate_id, payload)
            VALUES ($1, 'transaction', $2, $3)
            "#,
        )
        .bind(EVENT_TRANSFER_POSTED)
        .bind(&txn_id)
        .bind(&payload)
        .execute(&mut **tx)
        .await?;

        Ok(Transaction {
            id: txn_id,
            request_id: input.request_id.clone(),
            created_at,
        })
    }

    async fn spool_transfer_tx(
        tx: &mut PgTx<'_, Postgres>,
        input: &CreateTransferInput,
        fail_reason: &str,
    ) -> Result<String, LedgerError> {
        let spool_id: String = sqlx::query_scalar(
            r#"
            INSERT INTO spooled_transfers
                (request_id, payload_hash, from_account, to_account, amount_units, zone_id,
                 metadata, status, fail_reason, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'PENDING', $8, now())
            RETURNING id::text
            "#,
        )
        .bind(&input.request_id)
        .bind(&input.payload_hash)
        .bind(&input.from_account)
        .bind(&input.to_account)
        .bind(input.amount_units)
        .bind(&input.zone_id)
        .bind(&input.metadata)
        .bind(fail_reason)
        .fetch_one(&mut **tx)
        .await?;

        Self::audit_tx(
            tx,
            "system",
            "SPOOL_TRANSFER",
            "zone",
            &input.zone_id,
            Some(fail_reason),
            json!({"request_id": input.request_id, "spool_id": spool_id}),
        )
        .await?;

        Ok(spool_id)
    }
}

/// Why admission would not apply this transfer right now, if anything.
///
/// The throttle gate hashes the request id, so one request always lands
/// in the same bucket no matter how often it is retried.
fn blocked_reason(status: &str, controls: &ZoneControls, request_id: &str) -> Option<&'static str> {
    if status == "DOWN" {
        return Some("zone down");
    }
    if controls.writes_blocked {
        return Some("writes blocked");
    }
    let throttle = controls.cross_zone_throttle;
    if throttle < 100 {
        if throttle <= 0 {
            return Some("throttled");
        }
        if fnv1a32_percent(request_id) >= throttle as u32 {
            return Some("throttled");
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn controls(writes_blocked: bool, throttle: i32, spool: bool) -> ZoneControls {
        ZoneControls {
            zone_id: "zone-eu".into(),
            writes_blocked,
            cross_zone_throttle: throttle,
            spool_enabled: spool,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_blocked_reason_zone_down_wins() {
        let c = controls(true, 0, false);
        assert_eq!(blocked_reason("DOWN", &c, "r1"), Some("zone down"));
    }

    #[test]
    fn test_blocked_reason_writes_blocked() {
        let c = controls(true, 100, false);
        assert_eq!(blocked_reason("OK", &c, "r1"), Some("writes blocked"));
    }

    #[test]
    fn test_blocked_reason_throttle_zero_blocks_all() {
        let c = controls(false, 0, false);
        for i in 0..50 {
            assert_eq!(
                blocked_reason("OK", &c, &format!("r{i}")),
                Some("throttled")
            );
        }
    }

    #[test]
    fn test_blocked_reason_open_zone() {
        let c = controls(false, 100, false);
        assert_eq!(blocked_reason("OK", &c, "r1"), None);
        assert_eq!(blocked_reason("DEGRADED", &c, "r1"), None);
    }

    #[test]
    fn test_blocked_reason_throttle_deterministic() {
        let c = controls(false, 40, false);
        let first = blocked_reason("OK", &c, "retry-me");
        for _ in 0..20 {
            assert_eq!(blocked_reason("OK", &c, "retry-me"), first);
        }
    }

    #[test]
    fn test_blocked_reason_throttle_matches_bucket() {
        let c = controls(false, 40, false);
        for i in 0..200 {
            let rid = format!("req-{i}");
            let expect_blocked = fnv1a32_percent(&rid) >= 40;
            assert_eq!(blocked_reason("OK", &c, &rid).is_some(), expect_blocked);
        }
    }

    #[test]
    fn test_double_entry_nets_to_zero() {
        let amount: i64 = 123;
        assert_eq!((-amount) + amount, 0);
    }
}
