//! crates/casa_core/src/error.rs
//!
//! The error taxonomy shared by the domain logic and the service ports.
//! Every failure in the core is scoped to the single operation that raised
//! it; nothing here is fatal to the process.

/// The error type for all core operations and port implementations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Bad input shape or type. Recoverable; the message is safe to show
    /// to the caller as a field-level explanation.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Permission denied. Surfaced as a generic denial with no detail.
    #[error("Unauthorized")]
    Unauthorized,

    /// The entity or token does not exist (or is invisible to the caller).
    #[error("Not found: {0}")]
    NotFound(String),

    /// A state transition was violated (double-redeem, write to a finished
    /// project, finishing twice).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A storage, email, or file-store failure. Logged by the caller and
    /// surfaced as a generic retryable error.
    #[error("Infrastructure error: {0}")]
    Infrastructure(String),
}

/// A convenience type alias for `Result<T, CoreError>`.
pub type CoreResult<T> = Result<T, CoreError>;
