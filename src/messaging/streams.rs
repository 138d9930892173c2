//! Event stream contract
//!
//! One file-backed stream carries every `events.>` subject. The broker
//! suppresses duplicate publishes inside a two-minute window keyed on the
//! publisher-supplied message id, which is what makes the outbox loop
//! safe to retry.

use std::time::Duration;

use anyhow::Result;
use async_nats::jetstream::{self, stream::Config, stream::DiscardPolicy, stream::RetentionPolicy, stream::StorageType};

/// Stream holding all ledger events.
pub const STREAM_NAME: &str = "EVENTS";

/// Subject for applied transfers.
pub const SUBJECT_TRANSFER_POSTED: &str = "events.transfer_posted";

/// Broker-side dedup window.
pub const DUPLICATE_WINDOW: Duration = Duration::from_secs(120);

const MAX_MSGS_PER_SUBJECT: i64 = 1_000_000;

/// Create the stream if missing (idempotent).
pub async fn ensure_streams(js: &jetstream::Context) -> Result<()> {
    js.get_or_create_stream(Config {
        name: STREAM_NAME.to_string(),
        subjects: vec!["events.>".to_string()],
        storage: StorageType::File,
        retention: RetentionPolicy::Limits,
        max_messages_per_subject: MAX_MSGS_PER_SUBJECT,
        discard: DiscardPolicy::Old,
        duplicate_window: DUPLICATE_WINDOW,
        ..Default::default()
    })
    .await
    .map_err(|e| anyhow::anyhow!("ensure stream {}: {}", STREAM_NAME, e))?;

    tracing::info!(stream = STREAM_NAME, "event stream ready");
    Ok(())
}
