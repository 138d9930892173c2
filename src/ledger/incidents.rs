//! Incident lifecycle
//!
//! Incidents are opened by operator actions and by the fraud consumer;
//! operators move them through OPEN → ACK → RESOLVED with an optional
//! assignee and a note trail kept inside `details`.

use chrono::Utc;
use serde_json::{json, Value};
use sqlx::Row;

use super::error::LedgerError;
use super::models::{Incident, IncidentAction, INCIDENT_ACTIONS};
use super::Ledger;

const INCIDENT_COLUMNS: &str = "id::text AS id, zone_id, related_txn_id::text AS related_txn_id, \
     severity, status, title, details, detected_at";

impl Ledger {
    /// Most recent incidents across all zones.
    pub async fn list_recent_incidents(&self, limit: i64) -> Result<Vec<Incident>, LedgerError> {
        let limit = if limit <= 0 || limit > 2000 { 500 } else { limit };
        let incidents = sqlx::query_as::<_, Incident>(&format!(
            "SELECT {INCIDENT_COLUMNS} FROM incidents ORDER BY detected_at DESC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(self.pool())
        .await?;
        Ok(incidents)
    }

    /// Incidents for one zone, newest first.
    pub async fn list_incidents_by_zone(&self, zone_id: &str) -> Result<Vec<Incident>, LedgerError> {
        let incidents = sqlx::query_as::<_, Incident>(&format!(
            "SELECT {INCIDENT_COLUMNS} FROM incidents WHERE zone_id = $1 \
             ORDER BY detected_at DESC LIMIT 200"
        ))
        .bind(zone_id)
        .fetch_all(self.pool())
        .await?;
        Ok(incidents)
    }

    pub async fn get_incident(&self, id: &str) -> Result<Option<Incident>, LedgerError> {
        let incident = sqlx::query_as::<_, Incident>(&format!(
            "SELECT {INCIDENT_COLUMNS} FROM incidents WHERE id::text = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await?;
        Ok(incident)
    }

    /// Apply an operator action (ACK, ASSIGN, RESOLVE) to an incident.
    pub async fn apply_incident_action(
        &self,
        incident_id: &str,
        action: IncidentAction,
    ) -> Result<Incident, LedgerError> {
        if action.actor.is_empty() {
            return Err(LedgerError::BadRequest("actor required".into()));
        }
        if !INCIDENT_ACTIONS.contains(&action.action.as_str()) {
            return Err(LedgerError::BadRequest(format!(
                "invalid action: {}",
                action.action
            )));
        }
        let assignee = action.assignee.as_deref().unwrap_or("");
        if action.action == "ASSIGN" && assignee.is_empty() {
            return Err(LedgerError::BadRequest("assignee required".into()));
        }

        let mut tx = self.pool().begin().await?;

        let current = sqlx::query_as::<_, Incident>(&format!(
            "SELECT {INCIDENT_COLUMNS} FROM incidents WHERE id::text = $1"
        ))
        .bind(incident_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| LedgerError::BadRequest(format!("incident not found: {incident_id}")))?;

        let details = mutate_details(&current.details, &action);
        let new_status = match action.action.as_str() {
            "ACK" => "ACK",
            "RESOLVE" => "RESOLVED",
            _ => current.status.as_str(),
        };

        let row = sqlx::query(&format!(
            "UPDATE incidents SET status = $2, details = $3 WHERE id::text = $1 \
             RETURNING {INCIDENT_COLUMNS}"
        ))
        .bind(incident_id)
        .bind(new_status)
        .bind(&details)
        .fetch_one(&mut *tx)
        .await?;

        let updated = Incident {
            id: row.get("id"),
            zone_id: row.get("zone_id"),
            related_txn_id: row.get("related_txn_id"),
            severity: row.get("severity"),
            status: row.get("status"),
            title: row.get("title"),
            details: row.get("details"),
            detected_at: row.get("detected_at"),
        };

        Self::audit_tx(
            &mut tx,
            &action.actor,
            &format!("INCIDENT_{}", action.action),
            "incident",
            incident_id,
            action.reason.as_deref(),
            json!({
                "assignee": assignee,
                "note": action.note.as_deref().unwrap_or(""),
                "status": new_status,
            }),
        )
        .await?;

        tx.commit().await?;
        Ok(updated)
    }
}

/// Fold an action into the incident's details document.
fn mutate_details(details: &Value, action: &IncidentAction) -> Value {
    let mut out = match details {
        Value::Object(map) => map.clone(),
        _ => serde_json::Map::new(),
    };

    if action.action == "ASSIGN" {
        if let Some(assignee) = &action.assignee {
            out.insert("assignee".to_string(), json!(assignee));
        }
    }

    if let Some(note) = action.note.as_deref().filter(|n| !n.is_empty()) {
        let mut notes = out
            .get("notes")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        notes.push(json!({
            "at": Utc::now().to_rfc3339(),
            "actor": action.actor,
            "note": note,
            "action": action.action,
        }));
        out.insert("notes".to_string(), Value::Array(notes));
    }

    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action(kind: &str, note: Option<&str>, assignee: Option<&str>) -> IncidentAction {
        IncidentAction {
            action: kind.to_string(),
            assignee: assignee.map(str::to_string),
            note: note.map(str::to_string),
            actor: "sre-1".to_string(),
            reason: None,
        }
    }

    #[test]
    fn test_mutate_details_appends_notes() {
        let base = json!({"rule": "large_transfer"});
        let first = mutate_details(&base, &action("ACK", Some("looking"), None));
        let second = mutate_details(&first, &action("RESOLVE", Some("false alarm"), None));

        let notes = second["notes"].as_array().unwrap();
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0]["note"], "looking");
        assert_eq!(notes[1]["action"], "RESOLVE");
        // Pre-existing keys survive.
        assert_eq!(second["rule"], "large_transfer");
    }

    #[test]
    fn test_mutate_details_sets_assignee() {
        let out = mutate_details(&json!({}), &action("ASSIGN", None, Some("sre-2")));
        assert_eq!(out["assignee"], "sre-2");
        assert!(out.get("notes").is_none());
    }

    #[test]
    fn test_mutate_details_empty_note_ignored() {
        let out = mutate_details(&json!({}), &action("ACK", Some(""), None));
        assert!(out.get("notes").is_none());
    }

    #[test]
    fn test_mutate_details_non_object_reset() {
        let out = mutate_details(&json!("garbage"), &action("ASSIGN", None, Some("sre-2")));
        assert_eq!(out["assignee"], "sre-2");
    }
}
