//! Ledger error types
//!
//! The engine recovers nothing locally; every failure surfaces as one of
//! these typed variants and the web layer maps them to HTTP statuses.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    // === Admission errors ===
    #[error("missing/invalid fields: {0}")]
    BadRequest(String),

    #[error("idempotency conflict")]
    IdempotencyConflict,

    #[error("zone unknown: {0}")]
    ZoneUnknown(String),

    #[error("zone down")]
    ZoneDown,

    #[error("zone blocked")]
    ZoneBlocked,

    // === Replay errors ===
    #[error("zone not ready for replay")]
    NotReady,

    // === System errors ===
    #[error("database error: {0}")]
    Database(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    /// Stable error code for API responses and logs.
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::BadRequest(_) => "BAD_REQUEST",
            LedgerError::IdempotencyConflict => "IDEMPOTENCY_CONFLICT",
            LedgerError::ZoneUnknown(_) => "ZONE_UNKNOWN",
            LedgerError::ZoneDown => "ZONE_DOWN",
            LedgerError::ZoneBlocked => "ZONE_BLOCKED",
            LedgerError::NotReady => "NOT_READY",
            LedgerError::Database(_) => "DATABASE_ERROR",
            LedgerError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP status code for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            LedgerError::BadRequest(_) => 400,
            LedgerError::IdempotencyConflict => 409,
            LedgerError::NotReady => 409,
            LedgerError::ZoneDown | LedgerError::ZoneBlocked => 503,
            // Upstream treats an unknown zone as bad input, but at this
            // level it means the caller bypassed seeding.
            LedgerError::ZoneUnknown(_) => 500,
            LedgerError::Database(_) | LedgerError::Internal(_) => 500,
        }
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        LedgerError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(e: serde_json::Error) -> Self {
        LedgerError::Internal(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            LedgerError::IdempotencyConflict.code(),
            "IDEMPOTENCY_CONFLICT"
        );
        assert_eq!(LedgerError::ZoneDown.code(), "ZONE_DOWN");
        assert_eq!(LedgerError::NotReady.code(), "NOT_READY");
    }

    #[test]
    fn test_http_status() {
        assert_eq!(LedgerError::BadRequest("x".into()).http_status(), 400);
        assert_eq!(LedgerError::IdempotencyConflict.http_status(), 409);
        assert_eq!(LedgerError::NotReady.http_status(), 409);
        assert_eq!(LedgerError::ZoneDown.http_status(), 503);
        assert_eq!(LedgerError::ZoneBlocked.http_status(), 503);
        assert_eq!(LedgerError::ZoneUnknown("zone-xx".into()).http_status(), 500);
        assert_eq!(LedgerError::Database("boom".into()).http_status(), 500);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            LedgerError::IdempotencyConflict.to_string(),
            "idempotency conflict"
        );
        assert_eq!(LedgerError::ZoneDown.to_string(), "zone down");
    }
}
