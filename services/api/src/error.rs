//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service.

use crate::config::ConfigError;
use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use roadmap_core::ports::PortError;
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A malformed or oversized multipart upload.
    #[error("Multipart error: {0}")]
    Multipart(#[from] MultipartError),

    #[error("Upload exceeds the limit of {0} bytes")]
    UploadTooLarge(usize),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

/// The JSON body sent with every error response.
#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    pub details: String,
}

impl ApiError {
    fn status_and_label(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Port(PortError::NotFound(_)) => (StatusCode::NOT_FOUND, "Not found"),
            ApiError::Port(PortError::Validation(_)) => (StatusCode::BAD_REQUEST, "Invalid request"),
            ApiError::Port(PortError::Unauthorized) => (StatusCode::UNAUTHORIZED, "Unauthorized"),
            ApiError::Port(PortError::Generation(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Content generation failed")
            }
            ApiError::Multipart(e) => (e.status(), "Invalid upload"),
            ApiError::UploadTooLarge(_) => (StatusCode::PAYLOAD_TOO_LARGE, "Invalid upload"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, label) = self.status_and_label();
        let details = match &self {
            ApiError::Port(PortError::NotFound(msg))
            | ApiError::Port(PortError::Validation(msg))
            | ApiError::Port(PortError::Generation(msg)) => msg.clone(),
            ApiError::Port(PortError::Unauthorized) => {
                "This resource belongs to another user".to_string()
            }
            ApiError::Multipart(e) => e.body_text(),
            ApiError::UploadTooLarge(limit) => {
                format!("The file must be at most {} MB", limit / (1024 * 1024))
            }
            // Storage and infrastructure details stay in the logs.
            _ => "The server could not complete the request".to_string(),
        };
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        let body = ErrorBody {
            error: label.to_string(),
            details,
        };
        (status, Json(body)).into_response()
    }
}
