//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service, plus the
//! mapping from the core error taxonomy to HTTP responses.

use axum::http::StatusCode;
use casa_core::error::CoreError;
use tracing::error;

use crate::config::ConfigError;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

/// Maps a core error to the HTTP response handlers return.
///
/// Validation and conflict messages are safe to surface as-is; permission
/// and infrastructure failures are deliberately generic so nothing leaks.
pub fn core_error_response(err: CoreError) -> (StatusCode, String) {
    match err {
        CoreError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
        CoreError::Unauthorized => (StatusCode::FORBIDDEN, "Permission denied".to_string()),
        CoreError::NotFound(_) => (StatusCode::NOT_FOUND, "Not found".to_string()),
        CoreError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        CoreError::Infrastructure(msg) => {
            error!("Infrastructure error: {}", msg);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An internal error occurred, please retry".to_string(),
            )
        }
    }
}
