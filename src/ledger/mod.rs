//! Ledger engine
//!
//! Transfer admission and apply, zone gating and controls, spool and
//! replay, incidents, snapshot/restore. Every mutation is a single
//! database transaction; the engine holds no state beyond the pool.

pub mod error;
pub mod models;

mod incidents;
mod queries;
mod snapshot;
mod transfers;
mod zones;

use sqlx::PgPool;

pub use error::LedgerError;
pub use transfers::{EVENT_ID_SENTINEL, EVENT_TRANSFER_POSTED};
pub use models::{
    AuditEntry, BalanceRow, CreateTransferInput, Incident, IncidentAction, PostingRow,
    ReplayResult, SpoolStats, Transaction, TransactionDetail, TransactionRow, TransferOutcome,
    Zone, ZoneControls,
};

/// The ledger engine: a concrete value over a shared pool.
#[derive(Clone)]
pub struct Ledger {
    pool: PgPool,
}

impl Ledger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub(crate) fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Append one audit trail entry inside the caller's transaction.
    pub(crate) async fn audit_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        actor: &str,
        action: &str,
        target_type: &str,
        target_id: &str,
        reason: Option<&str>,
        details: serde_json::Value,
    ) -> Result<(), LedgerError> {
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
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}
