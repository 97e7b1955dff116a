//! Error types for vocab-core.

use thiserror::Error;

/// Result type alias using PolicyError.
pub type Result<T> = std::result::Result<T, PolicyError>;

/// Errors raised when a stored record does not satisfy the ladder invariants.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("invalid ladder level {0}")]
    InvalidLevel(i64),

    #[error("unknown card status '{0}'")]
    UnknownStatus(String),

    #[error("status {status} does not match level {level}")]
    StatusMismatch { status: String, level: u8 },
}
