//! Error handling for RoomHub

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Error types
///
/// Broker connection errors never appear here: they are logged, the bridge
/// state moves to Error, and `publish` simply reports no dispatch.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Validation error (rejected before any I/O)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Object storage error (upload/list/delete failure)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Notification delivery error (broker dispatch or HTTP fallback failure)
    ///
    /// Always distinct from Storage: by the time delivery is attempted the
    /// primary action has already committed.
    #[error("Delivery error: {0}")]
    Delivery(String),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Upstream API error (equipment registry etc.)
    #[error("API error: {0}")]
    Api(String),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            Error::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            Error::Storage(msg) => (
                StatusCode::BAD_GATEWAY,
                "STORAGE_ERROR",
                msg.clone(),
            ),
            Error::Delivery(msg) => (
                StatusCode::BAD_GATEWAY,
                "DELIVERY_ERROR",
                msg.clone(),
            ),
            Error::Http(e) => (
                StatusCode::BAD_GATEWAY,
                "HTTP_ERROR",
                e.to_string(),
            ),
            Error::Api(msg) => (
                StatusCode::BAD_GATEWAY,
                "API_ERROR",
                msg.clone(),
            ),
        };

        tracing::error!(
            status = %status,
            error_code = %error_code,
            message = %message,
            "Request error"
        );

        let body = Json(json!({
            "error_code": error_code,
            "message": message
        }));

        (status, body).into_response()
    }
}
