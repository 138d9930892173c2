//! Read-side queries: balances, transactions, audit trail

use super::error::LedgerError;
use super::models::{AuditEntry, BalanceRow, PostingRow, TransactionDetail, TransactionRow};
use super::Ledger;
use sqlx::Row;

fn clamp_limit(limit: i64, max: i64, default: i64) -> i64 {
    if limit <= 0 || limit > max { default } else { limit }
}

impl Ledger {
    /// Balance projections, most recently touched first.
    pub async fn list_balances(&self, limit: i64) -> Result<Vec<BalanceRow>, LedgerError> {
        let limit = clamp_limit(limit, 500, 100);
        let rows = sqlx::query_as::<_, BalanceRow>(
            r#"
            SELECT account_id, balance_units, updated_at
            FROM balances
            ORDER BY updated_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    /// Recent transactions, newest first.
    pub async fn list_transactions(&self, limit: i64) -> Result<Vec<TransactionRow>, LedgerError> {
        let limit = clamp_limit(limit, 500, 100);
        let rows = sqlx::query_as::<_, TransactionRow>(
            r#"
            SELECT id::text AS id, request_id, from_account, to_account, amount_units,
                   zone_id, created_at
            FROM transactions
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    /// One transaction with metadata and both postings.
    pub async fn get_transaction(&self, id: &str) -> Result<Option<TransactionDetail>, LedgerError> {
        let row = sqlx::query(
            r#"
            SELECT id::text AS id, request_id, from_account, to_account, amount_units,
                   zone_id, created_at, metadata
            FROM transactions
            WHERE id::text = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let txn = TransactionRow {
            id: row.get("id"),
            request_id: row.get("request_id"),
            from_account: row.get("from_account"),
            to_account: row.get("to_account"),
            amount_units: row.get("amount_units"),
            zone_id: row.get("zone_id"),
            created_at: row.get("created_at"),
        };
        let metadata = row.get("metadata");

        let postings = sqlx::query_as::<_, PostingRow>(
            r#"
            SELECT account_id, direction, amount_units
            FROM postings
            WHERE txn_id::text = $1
            ORDER BY direction ASC
            "#,
        )
        .bind(id)
        .fetch_all(self.pool())
        .await?;

        Ok(Some(TransactionDetail {
            txn,
            metadata,
            postings,
        }))
    }

    /// Audit trail for a zone: entries targeting the zone itself plus
    /// entries targeting that zone's incidents, newest first.
    pub async fn list_audit_for_zone(
        &self,
        zone_id: &str,
        limit: i64,
    ) -> Result<Vec<AuditEntry>, LedgerError> {
        let limit = clamp_limit(limit, 500, 100);
        let rows = sqlx::query_as::<_, AuditEntry>(
            r#"
            (SELECT a.id::text AS id, a.actor, a.action, a.target_type, a.target_id,
                    a.reason, a.details, a.created_at
             FROM audit_log a
             WHERE a.target_type = 'zone' AND a.target_id = $1
             ORDER BY a.created_at DESC
             LIMIT $2)
            UNION ALL
            (SELECT a.id::text AS id, a.actor, a.action, a.target_type, a.target_id,
                    a.reason, a.details, a.created_at
             FROM audit_log a
             WHERE a.target_type = 'incident' AND a.target_id IN (
                 SELECT id::text FROM incidents WHERE zone_id = $1
             )
             ORDER BY a.created_at DESC
             LIMIT $2)
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(zone_id)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(0, 500, 100), 100);
        assert_eq!(clamp_limit(-5, 500, 100), 100);
        assert_eq!(clamp_limit(501, 500, 100), 100);
        assert_eq!(clamp_limit(500, 500, 100), 500);
        assert_eq!(clamp_limit(25, 500, 100), 25);
    }
}
