//! Error handling for the category router

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed or empty caller input
    #[error("{0}")]
    Validation(String),

    /// Requested state does not exist
    #[error("{0}")]
    NotFound(String),

    /// Forwarding requires an active category
    #[error("No active category set")]
    NoActiveCategory,

    /// Active category has no configured model endpoint
    #[error("No model endpoint found for '{0}'")]
    UnmappedCategory(String),

    /// Model endpoint unreachable or the exchange failed in transport
    #[error("Failed to contact model at {endpoint}: {detail}")]
    Forward { endpoint: String, detail: String },

    /// Durable backing error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Config error
    #[error("Config error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_code) = match &self {
            Error::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            Error::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Error::NoActiveCategory => (StatusCode::BAD_REQUEST, "NO_ACTIVE_CATEGORY"),
            Error::UnmappedCategory(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "UNMAPPED_CATEGORY")
            }
            Error::Forward { .. } => (StatusCode::BAD_GATEWAY, "FORWARD_ERROR"),
            Error::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
            Error::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR"),
            Error::Serialization(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "SERIALIZATION_ERROR")
            }
            Error::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
            Error::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(
                status = %status,
                error_code = %error_code,
                message = %message,
                "Request error"
            );
        } else {
            tracing::warn!(
                status = %status,
                error_code = %error_code,
                message = %message,
                "Request rejected"
            );
        }

        let body = match self {
            Error::Forward { endpoint, detail } => json!({
                "error": "Failed to contact model",
                "error_code": error_code,
                "endpoint": endpoint,
                "detail": detail,
            }),
            _ => json!({
                "error": message,
                "error_code": error_code,
            }),
        };

        (status, Json(body)).into_response()
    }
}
