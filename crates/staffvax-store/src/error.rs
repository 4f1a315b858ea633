// ABOUTME: Error taxonomy shared by both storage backends.
// ABOUTME: Classifies raw driver errors into constraint violations and backend outages.

use thiserror::Error;

/// Errors returned by a `StaffStore`. "Not found" is never an error; lookups
/// return `Ok(None)` instead.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend rejected a write (uniqueness, check, or not-null constraint).
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// The backend could not be reached or opened.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("sqlite error: {0}")]
    Sqlite(rusqlite::Error),

    #[error("postgres error: {0}")]
    Postgres(sqlx::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        use rusqlite::ErrorCode;

        match &err {
            rusqlite::Error::SqliteFailure(failure, message) => match failure.code {
                ErrorCode::ConstraintViolation => StoreError::ConstraintViolation(
                    message.clone().unwrap_or_else(|| failure.to_string()),
                ),
                ErrorCode::CannotOpen
                | ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::NotADatabase => StoreError::BackendUnavailable(err.to_string()),
                _ => StoreError::Sqlite(err),
            },
            _ => StoreError::Sqlite(err),
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if !matches!(db.kind(), sqlx::error::ErrorKind::Other) => {
                StoreError::ConstraintViolation(db.message().to_string())
            }
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => StoreError::BackendUnavailable(err.to_string()),
            _ => StoreError::Postgres(err),
        }
    }
}
