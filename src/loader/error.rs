//! Error types for the CSV loader.

use rocket_db_pools::sqlx;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal loader failures. Any of these aborts the run before rows are inserted.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("model {0} not found")]
    UnknownEntityType(String),
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode {} at line {line}: {message}", path.display())]
    Decode {
        path: PathBuf,
        line: u64,
        message: String,
    },
    #[error("invalid header in {}: {message}", path.display())]
    InvalidHeader { path: PathBuf, message: String },
    #[error("store error: {0}")]
    Store(#[source] StoreError),
}

/// Errors raised by an [`EntityStore`](super::EntityStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness, not-null, foreign-key or check constraint rejected the batch.
    #[error("integrity violation: {0}")]
    IntegrityViolation(String),
    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if is_integrity_violation(&err) {
            StoreError::IntegrityViolation(err.to_string())
        } else {
            StoreError::Database(err)
        }
    }
}

impl From<StoreError> for LoadError {
    fn from(err: StoreError) -> Self {
        LoadError::Store(err)
    }
}

/// SQLSTATE class 23 covers every integrity constraint violation.
fn is_integrity_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err)
            if db_err
                .code()
                .map(|code| code.starts_with("23"))
                .unwrap_or(false)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_database_errors_are_not_integrity_violations() {
        let err = StoreError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::Database(sqlx::Error::RowNotFound)));
    }

    #[test]
    fn unknown_entity_message_names_the_model() {
        let err = LoadError::UnknownEntityType("Foo".to_string());
        assert_eq!(err.to_string(), "model Foo not found");
    }
}
