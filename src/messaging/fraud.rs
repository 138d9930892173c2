//! Fraud consumer
//!
//! Pulls `transfer_posted` events through a durable consumer and raises
//! an incident when a single transfer moves an hour or more of time.
//! The inbox table guards against duplicate delivery: the inbox insert
//! and the rule's incident insert share one database transaction, so a
//! failed rule rolls the inbox row back and redelivery retries the whole
//! step.

use std::sync::Arc;
use std::time::Duration;

use async_nats::jetstream;
use futures::StreamExt;
use serde::Deserialize;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::streams::{STREAM_NAME, SUBJECT_TRANSFER_POSTED};
use crate::metrics::Metrics;

/// Durable consumer name; also the inbox `consumer` key.
pub const CONSUMER_NAME: &str = "fraud-v1";

/// One hour of time-currency, in seconds.
pub const LARGE_TRANSFER_THRESHOLD_UNITS: i64 = 3600;

const FETCH_BATCH: usize = 10;
const FETCH_MAX_WAIT: Duration = Duration::from_secs(1);

#[derive(Debug, Deserialize)]
struct TransferPosted {
    #[serde(default)]
    event_id: String,
    #[serde(default)]
    transaction_id: String,
    #[serde(default)]
    zone_id: String,
    #[serde(default)]
    amount_units: i64,
}

pub struct FraudConsumer {
    db: PgPool,
    js: jetstream::Context,
    metrics: Arc<Metrics>,
}

impl FraudConsumer {
    pub fn new(db: PgPool, js: jetstream::Context, metrics: Arc<Metrics>) -> Self {
        Self { db, js, metrics }
    }

    /// Consume loop; exits when the token is cancelled.
    pub async fn run(&self, shutdown: CancellationToken) {
        let consumer = match self.bind_consumer().await {
            Ok(c) => c,
            Err(e) => {
                error!(error = %e, "fraud consumer subscribe failed");
                return;
            }
        };

        loop {
            if shutdown.is_cancelled() {
                debug!("fraud consumer stopping");
                return;
            }

            let batch = tokio::select! {
                _ = shutdown.cancelled() => return,
                b = consumer
                    .fetch()
                    .max_messages(FETCH_BATCH)
                    .expires(FETCH_MAX_WAIT)
                    .messages() => b,
            };

            let mut messages = match batch {
                Ok(m) => m,
                Err(e) => {
                    warn!(error = %e, "fraud fetch failed");
                    continue;
                }
            };

            while let Some(msg) = messages.next().await {
                match msg {
                    Ok(msg) => {
                        if let Err(e) = self.handle_message(&msg).await {
                            // No ack: the broker redelivers (at-least-once).
                            warn!(error = %e, "fraud message handling failed; leaving unacked");
                        }
                    }
                    Err(e) => warn!(error = %e, "fraud fetch stream error"),
                }
            }
        }
    }

    async fn bind_consumer(
        &self,
    ) -> anyhow::Result<jetstream::consumer::PullConsumer> {
        let stream = self
            .js
            .get_stream(STREAM_NAME)
            .await
            .map_err(|e| anyhow::anyhow!("get stream: {}", e))?;

        let consumer = stream
            .get_or_create_consumer(
                CONSUMER_NAME,
                jetstream::consumer::pull::Config {
                    durable_name: Some(CONSUMER_NAME.to_string()),
                    filter_subject: SUBJECT_TRANSFER_POSTED.to_string(),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| anyhow::anyhow!("get consumer: {}", e))?;

        Ok(consumer)
    }

    /// Handle one message. An `Ok` return means the message was acked
    /// (processed or deliberately dropped); `Err` leaves it for
    /// redelivery.
    async fn handle_message(&self, msg: &jetstream::Message) -> anyhow::Result<()> {
        let Ok(mut ev) = serde_json::from_slice::<TransferPosted>(&msg.payload) else {
            // Broken payloads never become processable; drop them.
            warn!("dropping undecodable event payload");
            return ack(msg).await;
        };

        if ev.event_id.is_empty() {
            // Fall back to the broker message id header.
            ev.event_id = msg
                .headers
                .as_ref()
                .and_then(|h| h.get("Nats-Msg-Id"))
                .map(|v| v.as_str().to_string())
                .unwrap_or_default();
        }

        let Ok(event_id) = Uuid::parse_str(&ev.event_id) else {
            warn!(event_id = %ev.event_id, "dropping event without usable id");
            return ack(msg).await;
        };

        let mut tx = self.db.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO inbox_events (consumer, event_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(CONSUMER_NAME)
        .bind(event_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if inserted == 0 {
            // Duplicate delivery; the rule already ran (or is committed to
            // run) for this event.
            tx.commit().await?;
            debug!(event_id = %event_id, "duplicate event suppressed by inbox");
            return ack(msg).await;
        }

        if is_large_transfer(ev.amount_units) {
            let related_txn = Uuid::parse_str(&ev.transaction_id).ok();
            sqlx::query(
                r#"
                INSERT INTO incidents (zone_id, related_txn_id, severity, title, details)
                VALUES ($1, $2, 'WARN', 'Large time transfer', $3)
                "#,
            )
            .bind(&ev.zone_id)
            .bind(related_txn)
            .bind(serde_json::json!({
                "amount_units": ev.amount_units,
                "rule": "large_transfer",
            }))
            .execute(&mut *tx)
            .await?;
            self.metrics.fraud_incidents_total.inc();
            debug!(
                event_id = %event_id,
                amount_units = ev.amount_units,
                "large transfer incident raised"
            );
        }

        tx.commit().await?;
        ack(msg).await
    }
}

async fn ack(msg: &jetstream::Message) -> anyhow::Result<()> {
    msg.ack()
        .await
        .map_err(|e| anyhow::anyhow!("ack failed: {}", e))
}

/// The rule: one hour or more of time moved in a single transfer.
fn is_large_transfer(amount_units: i64) -> bool {
    amount_units >= LARGE_TRANSFER_THRESHOLD_UNITS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_large_transfer_threshold() {
        assert!(!is_large_transfer(3599));
        assert!(is_large_transfer(3600));
        assert!(is_large_transfer(7200));
        assert!(!is_large_transfer(0));
        assert!(!is_large_transfer(-3600));
    }

    #[test]
    fn test_event_decode_defaults() {
        let ev: TransferPosted = serde_json::from_str(r#"{"amount_units": 120}"#).unwrap();
        assert_eq!(ev.event_id, "");
        assert_eq!(ev.transaction_id, "");
        assert_eq!(ev.zone_id, "");
        assert_eq!(ev.amount_units, 120);
    }

    #[test]
    fn test_event_decode_full() {
        let ev: TransferPosted = serde_json::from_str(
            r#"{"event_id":"e1","transaction_id":"t1","zone_id":"zone-eu","amount_units":3600,"created_at":"2026-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(ev.event_id, "e1");
        assert!(is_large_transfer(ev.amount_units));
    }
}
