use std::fmt;
use tracing::error;

/// Error taxonomy for the ingestion and transfer pipeline.
///
/// Parser and currency errors abort the current operation immediately.
/// Validation errors carry the full accumulated picture for user-facing
/// display. Concurrency and recovery errors are retried per policy before
/// being surfaced verbatim.
#[derive(Debug, Clone, PartialEq)]
pub enum AppError {
    /// Required CAMT elements absent or structurally invalid.
    MalformedDocument(String),
    /// Input bytes could not be decoded to text before XML parsing began.
    EncodingError(String),
    /// Non-finite, malformed, or out-of-bound money input.
    InvalidAmount(String),
    /// Arithmetic result left the safe integer bound.
    Overflow(String),
    /// Accumulated validation failures (errors block, warnings never do).
    ValidationFailed {
        errors: Vec<String>,
        warnings: Vec<String>,
    },
    /// Another holder did not release the lock within the caller's timeout.
    LockTimeout(String),
    /// Lock bookkeeping failed for a reason other than contention.
    LockAcquisitionFailure(String),
    /// Circuit breaker is open; the wrapped operation was not attempted.
    CircuitOpen(String),
    NotFound(String),
    Unauthorized(String),
    Conflict(String),
    InternalError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::MalformedDocument(msg) => write!(f, "Malformed document: {msg}"),
            AppError::EncodingError(msg) => write!(f, "Encoding error: {msg}"),
            AppError::InvalidAmount(msg) => write!(f, "Invalid amount: {msg}"),
            AppError::Overflow(msg) => write!(f, "Overflow: {msg}"),
            AppError::ValidationFailed { errors, .. } => {
                write!(f, "Validation failed: {}", errors.join("; "))
            }
            AppError::LockTimeout(msg) => write!(f, "Lock timeout: {msg}"),
            AppError::LockAcquisitionFailure(msg) => write!(f, "Lock acquisition failure: {msg}"),
            AppError::CircuitOpen(msg) => write!(f, "Circuit open: {msg}"),
            AppError::NotFound(msg) => write!(f, "Not found: {msg}"),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {msg}"),
            AppError::Conflict(msg) => write!(f, "Conflict: {msg}"),
            AppError::InternalError(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl AppError {
    /// Message safe to show to an end user. Internal detail is logged here
    /// and replaced with a generic retry hint: business failures stay
    /// specific, system failures stay vague.
    pub fn user_message(&self) -> String {
        match self {
            AppError::InternalError(msg) => {
                error!("Internal error: {msg}");
                "An internal error occurred, please try again".to_string()
            }
            AppError::CircuitOpen(_) => {
                "The service is temporarily unavailable, please try again".to_string()
            }
            other => other.to_string(),
        }
    }
}

// Convenience conversion from sqlx::Error
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                AppError::Conflict(err.to_string())
            }
            _ => AppError::InternalError(err.to_string()),
        }
    }
}
