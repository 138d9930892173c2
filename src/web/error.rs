//! API error type
//!
//! Every error leaves the process as `{"error": "<message>"}` with a
//! status from the ledger taxonomy.

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::ledger::LedgerError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(json!({"error": self.message}))).into_response()
    }
}

impl From<LedgerError> for ApiError {
    fn from(e: LedgerError) -> Self {
        let status = StatusCode::from_u16(e.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self::new(status, e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_error_mapping() {
        let cases = [
            (LedgerError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (LedgerError::IdempotencyConflict, StatusCode::CONFLICT),
            (LedgerError::ZoneDown, StatusCode::SERVICE_UNAVAILABLE),
            (LedgerError::ZoneBlocked, StatusCode::SERVICE_UNAVAILABLE),
            (LedgerError::NotReady, StatusCode::CONFLICT),
            (
                LedgerError::ZoneUnknown("zone-xx".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                LedgerError::Database("boom".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[test]
    fn test_message_passthrough() {
        let e = ApiError::from(LedgerError::IdempotencyConflict);
        assert_eq!(e.message, "idempotency conflict");
    }
}
