//! Error types for the product and user operations.

use sqlx::error::{DatabaseError, ErrorKind};
use thiserror::Error;

/// Everything that can go wrong while serving one request.
///
/// None of these stop the consumer: the dispatcher turns each one into an
/// `error` response envelope whose `data` is the `Display` text.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Bad input: non-positive price, negative stock, empty required text.
    #[error("{0}")]
    Validation(String),

    /// A unique name or username is already taken.
    #[error("{0}")]
    Duplicate(String),

    /// A lookup by name, external ID or username matched nothing.
    #[error("{0}")]
    NotFound(String),

    /// The request payload is not the JSON shape the pattern expects.
    #[error("{0}")]
    Decode(#[from] serde_json::Error),

    /// No handler is registered for the pattern.
    #[error("unknown pattern: {0}")]
    UnknownPattern(String),

    /// An unexpected database failure.
    #[error("storage error: {0}")]
    Storage(#[source] sqlx::Error),
}

impl ServiceError {
    /// Short, stable label used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Duplicate(_) => "duplicate",
            Self::NotFound(_) => "not_found",
            Self::Decode(_) => "decode",
            Self::UnknownPattern(_) => "unknown_pattern",
            Self::Storage(_) => "storage",
        }
    }

    /// Maps a storage error, naming what was being looked for or written.
    ///
    /// `RowNotFound` becomes [`ServiceError::NotFound`] and a unique
    /// constraint violation becomes [`ServiceError::Duplicate`], so the
    /// storage layer's constraint is the final guard against check-then-insert
    /// races.
    pub fn from_sqlx(error: sqlx::Error, not_found: &str, duplicate: &str) -> Self {
        if matches!(error, sqlx::Error::RowNotFound) {
            return Self::NotFound(not_found.to_string());
        }

        match error.as_database_error().map(DatabaseError::kind) {
            Some(ErrorKind::UniqueViolation) => Self::Duplicate(duplicate.to_string()),
            _ => Self::Storage(error),
        }
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(error: sqlx::Error) -> Self {
        Self::from_sqlx(error, "record not found", "record already exists")
    }
}
