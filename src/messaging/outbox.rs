//! Transactional outbox publisher
//!
//! A background loop that drains unpublished outbox rows into the event
//! stream. At-least-once: a row is only marked published after the broker
//! acknowledges it, and duplicate publishes are suppressed broker-side by
//! the message id (= outbox row id).

use std::sync::Arc;
use std::time::Duration;

use async_nats::jetstream;
use serde_json::Value;
use sqlx::{PgPool, Row};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::streams::SUBJECT_TRANSFER_POSTED;
use crate::ledger::EVENT_ID_SENTINEL;
use crate::metrics::Metrics;

const TICK_INTERVAL: Duration = Duration::from_millis(250);
const BATCH_LIMIT: i64 = 50;

pub struct OutboxPublisher {
    db: PgPool,
    js: jetstream::Context,
    metrics: Arc<Metrics>,
}

impl OutboxPublisher {
    pub fn new(db: PgPool, js: jetstream::Context, metrics: Arc<Metrics>) -> Self {
        Self { db, js, metrics }
    }

    /// Publish loop; exits when the token is cancelled.
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(TICK_INTERVAL);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("outbox publisher stopping");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.publish_batch(BATCH_LIMIT).await {
                        warn!(error = %e, "outbox batch failed; will retry next tick");
                    }
                }
            }
        }
    }

    /// Publish up to `limit` unpublished rows in created order.
    ///
    /// Stops at the first failure; unpublished rows stay eligible for the
    /// next tick.
    pub async fn publish_batch(&self, limit: i64) -> anyhow::Result<usize> {
        let rows = sqlx::query(
            r#"
            SELECT id::text AS id, event_type, payload
            FROM outbox_events
            WHERE published_at IS NULL
            ORDER BY created_at
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        let mut published = 0usize;
        for row in rows {
            let id: String = row.get("id");
            let payload: Value = row.get("payload");
            let body = serde_json::to_vec(&rewrite_event_id(payload, &id))?;

            // The message id is what the broker dedups on.
            let mut headers = async_nats::HeaderMap::new();
            headers.insert("Nats-Msg-Id", id.as_str());

            self.js
                .publish_with_headers(SUBJECT_TRANSFER_POSTED, headers, body.into())
                .await
                .map_err(|e| anyhow::anyhow!("publish {}: {}", id, e))?
                .await
                .map_err(|e| anyhow::anyhow!("publish ack {}: {}", id, e))?;

            sqlx::query("UPDATE outbox_events SET published_at = now() WHERE id = $1::uuid")
                .bind(&id)
                .execute(&self.db)
                .await?;

            self.metrics.outbox_published_total.inc();
            published += 1;
        }

        if published > 0 {
            debug!(published, "outbox batch published");
        }
        Ok(published)
    }
}

/// Replace the apply-time sentinel (or a missing id) with the outbox row
/// id, which is the identity the broker and the inbox both key on.
fn rewrite_event_id(payload: Value, outbox_id: &str) -> Value {
    let mut map = match payload {
        Value::Object(map) => map,
        other => {
            // Non-object payloads should not happen; wrap so the id survives.
            let mut map = serde_json::Map::new();
            map.insert("payload".to_string(), other);
            map
        }
    };

    let needs_rewrite = match map.get("event_id") {
        None => true,
        Some(Value::String(s)) => s == EVENT_ID_SENTINEL,
        Some(_) => true,
    };
    if needs_rewrite {
        map.insert("event_id".to_string(), Value::String(outbox_id.to_string()));
    }
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rewrite_replaces_sentinel() {
        let payload = json!({"event_id": "generated_by_db", "amount_units": 120});
        let out = rewrite_event_id(payload, "ob-1");
        assert_eq!(out["event_id"], "ob-1");
        assert_eq!(out["amount_units"], 120);
    }

    #[test]
    fn test_rewrite_fills_missing_id() {
        let payload = json!({"amount_units": 120});
        let out = rewrite_event_id(payload, "ob-2");
        assert_eq!(out["event_id"], "ob-2");
    }

    #[test]
    fn test_rewrite_keeps_explicit_id() {
        let payload = json!({"event_id": "already-set"});
        let out = rewrite_event_id(payload, "ob-3");
        assert_eq!(out["event_id"], "already-set");
    }

    #[test]
    fn test_rewrite_non_string_id_replaced() {
        let payload = json!({"event_id": 42});
        let out = rewrite_event_id(payload, "ob-4");
        assert_eq!(out["event_id"], "ob-4");
    }
}
