//! Zone status and containment controls

use serde_json::json;
use sqlx::Row;
use tracing::info;

use super::error::LedgerError;
use super::models::{Zone, ZoneControls, ZONE_STATUSES};
use super::Ledger;

impl Ledger {
    /// All zones, stable order.
    pub async fn list_zones(&self) -> Result<Vec<Zone>, LedgerError> {
        let zones = sqlx::query_as::<_, Zone>(
            "SELECT id, name, status, updated_at FROM zones ORDER BY id",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(zones)
    }

    /// Set a zone's status. Marking a zone DOWN opens a CRITICAL incident.
    pub async fn set_zone_status(
        &self,
        zone_id: &str,
        status: &str,
        actor: &str,
        reason: Option<&str>,
    ) -> Result<Zone, LedgerError> {
        if !ZONE_STATUSES.contains(&status) {
            return Err(LedgerError::BadRequest(format!("invalid status: {status}")));
        }

        let mut tx = self.pool().begin().await?;

        let row = sqlx::query(
            r#"
            UPDATE zones SET status = $2, updated_at = now()
            WHERE id = $1
            RETURNING id, name, status, updated_at
            "#,
        )
        .bind(zone_id)
        .bind(status)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| LedgerError::ZoneUnknown(zone_id.to_string()))?;

        let zone = Zone {
            id: row.get("id"),
            name: row.get("name"),
            status: row.get("status"),
            updated_at: row.get("updated_at"),
        };

        Self::audit_tx(
            &mut tx,
            actor,
            "SET_ZONE_STATUS",
            "zone",
            zone_id,
            reason,
            json!({"status": status}),
        )
        .await?;

        if status == "DOWN" {
            sqlx::query(
                r#"
                INSERT INTO incidents (zone_id, severity, title, details)
                VALUES ($1, 'CRITICAL', 'Zone marked DOWN', $2)
                "#,
            )
            .bind(zone_id)
            .bind(json!({"reason": reason, "actor": actor}))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        info!(zone_id, status, actor, "zone status updated");
        Ok(zone)
    }

    /// Read a zone's controls, materializing the default row on demand.
    pub async fn get_zone_controls(&self, zone_id: &str) -> Result<ZoneControls, LedgerError> {
        let mut tx = self.pool().begin().await?;
        let controls = Self::controls_tx(&mut tx, zone_id).await?;
        tx.commit().await?;
        Ok(controls)
    }

    /// Replace a zone's controls.
    ///
    /// Strong containment (writes blocked, or throttle dropped to zero)
    /// opens an incident so the change is visible on the board.
    pub async fn set_zone_controls(
        &self,
        zone_id: &str,
        writes_blocked: bool,
        cross_zone_throttle: i32,
        spool_enabled: bool,
        actor: &str,
        reason: Option<&str>,
    ) -> Result<ZoneControls, LedgerError> {
        if !(0..=100).contains(&cross_zone_throttle) {
            return Err(LedgerError::BadRequest(format!(
                "invalid cross_zone_throttle: {cross_zone_throttle}"
            )));
        }

        let mut tx = self.pool().begin().await?;

        sqlx::query("INSERT INTO zone_controls (zone_id) VALUES ($1) ON CONFLICT DO NOTHING")
            .bind(zone_id)
            .execute(&mut *tx)
            .await?;

        let controls = sqlx::query_as::<_, ZoneControls>(
            r#"
            UPDATE zone_controls
            SET writes_blocked = $2, cross_zone_throttle = $3, spool_enabled = $4,
                updated_at = now()
            WHERE zone_id = $1
            RETURNING zone_id, writes_blocked, cross_zone_throttle, spool_enabled, updated_at
            "#,
        )
        .bind(zone_id)
        .bind(writes_blocked)
        .bind(cross_zone_throttle)
        .bind(spool_enabled)
        .fetch_one(&mut *tx)
        .await?;

        Self::audit_tx(
            &mut tx,
            actor,
            "SET_ZONE_CONTROLS",
            "zone",
            zone_id,
            reason,
            json!({
                "writes_blocked": writes_blocked,
                "cross_zone_throttle": cross_zone_throttle,
                "spool_enabled": spool_enabled,
            }),
        )
        .await?;

        if writes_blocked || cross_zone_throttle == 0 {
            let (severity, title) = if writes_blocked {
                ("CRITICAL", "Writes blocked by operator")
            } else {
                ("WARN", "Zone controls tightened")
            };
            sqlx::query(
                r#"
                INSERT INTO incidents (zone_id, severity, title, details)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(zone_id)
            .bind(severity)
            .bind(title)
            .bind(json!({
                "reason": reason,
                "actor": actor,
                "writes_blocked": writes_blocked,
                "cross_zone_throttle": cross_zone_throttle,
                "spool_enabled": spool_enabled,
            }))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        info!(
            zone_id,
            writes_blocked, cross_zone_throttle, spool_enabled, actor, "zone controls updated"
        );
        Ok(controls)
    }
}
