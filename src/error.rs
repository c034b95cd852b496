use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Application error taxonomy.
///
/// Implements [`IntoResponse`] so handlers can bubble errors with `?` and
/// still produce the `{"success": false, "error": ...}` JSON envelope.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Wrong admin password. Deliberately generic: no detail about why the
    /// login failed is leaked.
    #[error("Invalid password")]
    InvalidCredentials,

    /// No active session for a gated endpoint.
    #[error("Authentication required")]
    Unauthorized,

    /// QR token absent, expired, or exhausted. One message covers all three
    /// causes so tokens cannot be enumerated.
    #[error("Invalid or expired QR code token")]
    InvalidOrExpiredToken,

    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    #[error("{entity} already exists")]
    AlreadyExists { entity: &'static str },

    /// Deleting a parent that still has dependent scores.
    #[error("Cannot delete {entity} with existing scores")]
    HasDependents { entity: &'static str, count: i64 },

    /// Caller-facing validation failure (bad range, empty name, ...).
    #[error("{0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, Error>;

/// Whether internal error details may be included in responses. Off unless
/// `DEBUG_MODE=true` is set in the environment.
fn debug_mode() -> bool {
    std::env::var("DEBUG_MODE").map(|v| v == "true" || v == "1").unwrap_or(false)
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Error::InvalidCredentials | Error::Unauthorized | Error::InvalidOrExpiredToken => (
                StatusCode::UNAUTHORIZED,
                json!({ "success": false, "error": self.to_string() }),
            ),
            Error::NotFound { .. } => (
                StatusCode::NOT_FOUND,
                json!({ "success": false, "error": self.to_string() }),
            ),
            Error::AlreadyExists { .. } => (
                StatusCode::CONFLICT,
                json!({ "success": false, "error": self.to_string() }),
            ),
            Error::HasDependents { count, .. } => (
                StatusCode::CONFLICT,
                json!({
                    "success": false,
                    "error": self.to_string(),
                    "score_count": count,
                }),
            ),
            Error::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                json!({ "success": false, "error": msg }),
            ),
            Error::Database(diesel::result::Error::NotFound) => (
                StatusCode::NOT_FOUND,
                json!({ "success": false, "error": "Resource not found" }),
            ),
            Error::Database(_) | Error::Pool(_) | Error::Internal(_) => {
                tracing::error!(error = %self, "internal error");
                let message = if debug_mode() {
                    self.to_string()
                } else {
                    "Internal server error".to_string()
                };
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "success": false, "error": message }),
                )
            }
        };

        (status, axum::Json(body)).into_response()
    }
}
