//! Aggregate store error types.

use thiserror::Error;
use vocab_core::PolicyError;

/// Store result type alias.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The record does not exist yet. Engines recover from this by creating
    /// the default record; it never reaches callers of a finished operation.
    #[error("{kind} not found: {key}")]
    NotFound { kind: &'static str, key: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("timed out waiting for lock on {0}")]
    LockTimeout(String),

    #[error("corrupt record: {0}")]
    Corrupt(#[from] PolicyError),
}

impl StoreError {
    pub fn not_found(kind: &'static str, key: impl std::fmt::Display) -> Self {
        Self::NotFound {
            kind,
            key: key.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Turns the not-found signal into `None`, like rusqlite's `OptionalExtension`.
pub trait OptionalRecord<T> {
    fn optional(self) -> StoreResult<Option<T>>;
}

impl<T> OptionalRecord<T> for StoreResult<T> {
    fn optional(self) -> StoreResult<Option<T>> {
        match self {
            Ok(record) => Ok(Some(record)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }
}
