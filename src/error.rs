use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Unified error type for the lumora-calendar service.
#[derive(Debug, thiserror::Error)]
pub enum CalendarError {
    // ── Auth Errors ─────────────────────────────────────────────────────
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid session token: {0}")]
    InvalidSession(String),

    /// Access token expired and the refresh exchange failed. The stale
    /// token record is kept so the user can reconnect explicitly.
    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    // ── Resource Errors ─────────────────────────────────────────────────
    #[error("Calendar account not connected")]
    NotConnected,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Invalid state parameter")]
    InvalidState,

    // ── Provider Errors ─────────────────────────────────────────────────
    #[error("Calendar provider error: {0}")]
    Upstream(String),

    // ── Crypto Errors ───────────────────────────────────────────────────
    #[error("Crypto error: {0}")]
    Crypto(String),

    // ── Internal ────────────────────────────────────────────────────────
    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for CalendarError {
    fn from(e: sqlx::Error) -> Self {
        tracing::error!("Database error: {e}");
        CalendarError::Database(e.to_string())
    }
}

impl From<anyhow::Error> for CalendarError {
    fn from(e: anyhow::Error) -> Self {
        CalendarError::Internal(e.to_string())
    }
}

impl IntoResponse for CalendarError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            CalendarError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            CalendarError::InvalidSession(_) => (StatusCode::UNAUTHORIZED, "invalid_session"),
            CalendarError::RefreshFailed(_) => (StatusCode::UNAUTHORIZED, "refresh_failed"),
            CalendarError::NotConnected => (StatusCode::NOT_FOUND, "not_connected"),
            CalendarError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            CalendarError::InvalidState => (StatusCode::BAD_REQUEST, "invalid_state"),
            // Single-resource provider failures surface as 500 to the caller.
            CalendarError::Upstream(_) => (StatusCode::INTERNAL_SERVER_ERROR, "upstream_error"),
            CalendarError::Crypto(_) => (StatusCode::INTERNAL_SERVER_ERROR, "crypto_error"),
            CalendarError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
            CalendarError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let body = json!({
            "error": {
                "code": code,
                "message": self.to_string(),
            }
        });

        (status, axum::Json(body)).into_response()
    }
}
