//! Ledger schema
//!
//! DDL is applied idempotently at startup; the schema is the durable
//! contract, the storage engine behind it is not. Identifiers are opaque
//! text, uuids come from `gen_random_uuid()`, amounts are BIGINT whole
//! seconds.

use anyhow::Result;
use sqlx::PgPool;

/// Apply the schema and seed the zone table.
pub async fn init_schema(pool: &PgPool) -> Result<()> {
    tracing::info!("Applying ledger schema...");

    for ddl in SCHEMA_STATEMENTS {
        sqlx::query(ddl)
            .execute(pool)
            .await
            .map_err(|e| anyhow::anyhow!("schema statement failed: {}", e))?;
    }

    sqlx::query(SEED_ZONES).execute(pool).await?;

    tracing::info!("Ledger schema ready");
    Ok(())
}

const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_ZONES,
    CREATE_ZONE_CONTROLS,
    CREATE_ACCOUNTS,
    CREATE_TRANSACTIONS,
    CREATE_POSTINGS,
    CREATE_BALANCES,
    CREATE_OUTBOX_EVENTS,
    CREATE_OUTBOX_UNPUBLISHED_INDEX,
    CREATE_INBOX_EVENTS,
    CREATE_SPOOLED_TRANSFERS,
    CREATE_INCIDENTS,
    CREATE_AUDIT_LOG,
];

const CREATE_ZONES: &str = r#"
CREATE TABLE IF NOT EXISTS zones (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'OK' CHECK (status IN ('OK','DEGRADED','DOWN')),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#;

const CREATE_ZONE_CONTROLS: &str = r#"
CREATE TABLE IF NOT EXISTS zone_controls (
    zone_id TEXT PRIMARY KEY REFERENCES zones(id),
    writes_blocked BOOLEAN NOT NULL DEFAULT FALSE,
    cross_zone_throttle INT NOT NULL DEFAULT 100
        CHECK (cross_zone_throttle BETWEEN 0 AND 100),
    spool_enabled BOOLEAN NOT NULL DEFAULT FALSE,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#;

const CREATE_ACCOUNTS: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    id TEXT PRIMARY KEY,
    zone_id TEXT NOT NULL REFERENCES zones(id),
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#;

const CREATE_TRANSACTIONS: &str = r#"
CREATE TABLE IF NOT EXISTS transactions (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    request_id TEXT NOT NULL UNIQUE,
    payload_hash TEXT NOT NULL,
    from_account TEXT NOT NULL,
    to_account TEXT NOT NULL,
    amount_units BIGINT NOT NULL CHECK (amount_units > 0),
    zone_id TEXT NOT NULL REFERENCES zones(id),
    metadata JSONB NOT NULL DEFAULT '{}'::jsonb,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#;

const CREATE_POSTINGS: &str = r#"
CREATE TABLE IF NOT EXISTS postings (
    id BIGSERIAL PRIMARY KEY,
    txn_id UUID NOT NULL REFERENCES transactions(id) ON DELETE CASCADE,
    account_id TEXT NOT NULL REFERENCES accounts(id),
    direction TEXT NOT NULL CHECK (direction IN ('DEBIT','CREDIT')),
    amount_units BIGINT NOT NULL CHECK (amount_units > 0),
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#;

const CREATE_BALANCES: &str = r#"
CREATE TABLE IF NOT EXISTS balances (
    account_id TEXT PRIMARY KEY REFERENCES accounts(id),
    balance_units BIGINT NOT NULL DEFAULT 0,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#;

const CREATE_OUTBOX_EVENTS: &str = r#"
CREATE TABLE IF NOT EXISTS outbox_events (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    event_type TEXT NOT NULL,
    aggregate_type TEXT NOT NULL,
    aggregate_id TEXT NOT NULL,
    payload JSONB NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    published_at TIMESTAMPTZ
)
"#;

const CREATE_OUTBOX_UNPUBLISHED_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS outbox_events_unpublished_idx
    ON outbox_events (created_at)
    WHERE published_at IS NULL
"#;

const CREATE_INBOX_EVENTS: &str = r#"
CREATE TABLE IF NOT EXISTS inbox_events (
    consumer TEXT NOT NULL,
    event_id UUID NOT NULL,
    processed_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (consumer, event_id)
)
"#;

const CREATE_SPOOLED_TRANSFERS: &str = r#"
CREATE TABLE IF NOT EXISTS spooled_transfers (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    request_id TEXT NOT NULL UNIQUE,
    payload_hash TEXT NOT NULL,
    from_account TEXT NOT NULL,
    to_account TEXT NOT NULL,
    amount_units BIGINT NOT NULL CHECK (amount_units > 0),
    zone_id TEXT NOT NULL REFERENCES zones(id),
    metadata JSONB NOT NULL DEFAULT '{}'::jsonb,
    status TEXT NOT NULL DEFAULT 'PENDING'
        CHECK (status IN ('PENDING','APPLIED','FAILED')),
    fail_reason TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    applied_at TIMESTAMPTZ
)
"#;

// related_txn_id deliberately carries no foreign key: snapshot restore
// truncates transactions but re-inserts incidents that still point at
// historical transaction ids.
const CREATE_INCIDENTS: &str = r#"
CREATE TABLE IF NOT EXISTS incidents (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    zone_id TEXT NOT NULL REFERENCES zones(id),
    related_txn_id UUID,
    severity TEXT NOT NULL DEFAULT 'INFO' CHECK (severity IN ('INFO','WARN','CRITICAL')),
    status TEXT NOT NULL DEFAULT 'OPEN' CHECK (status IN ('OPEN','ACK','RESOLVED')),
    title TEXT NOT NULL,
    details JSONB NOT NULL DEFAULT '{}'::jsonb,
    detected_at TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#;

const CREATE_AUDIT_LOG: &str = r#"
CREATE TABLE IF NOT EXISTS audit_log (
    id BIGSERIAL PRIMARY KEY,
    actor TEXT NOT NULL,
    action TEXT NOT NULL,
    target_type TEXT NOT NULL,
    target_id TEXT NOT NULL,
    reason TEXT,
    details JSONB NOT NULL DEFAULT '{}'::jsonb,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#;

const SEED_ZONES: &str = r#"
INSERT INTO zones (id, name) VALUES
    ('zone-eu', 'Europe'),
    ('zone-na', 'North America'),
    ('zone-af', 'Africa'),
    ('zone-in', 'India'),
    ('zone-ap', 'Asia Pacific')
ON CONFLICT (id) DO NOTHING
"#;
