//! Error types for the PostgreSQL storage backend.

use sqlx_core::error::Error as SqlxError;
use starfish_storage::StorageError;

/// SQLSTATE class for connection exceptions (08xxx).
const PG_CONNECTION_EXCEPTION_CLASS: &str = "08";

/// SQLSTATE class for integrity constraint violations (23xxx).
const PG_INTEGRITY_CONSTRAINT_CLASS: &str = "23";

/// PostgreSQL error code for admin shutdown (57P01).
const PG_ADMIN_SHUTDOWN: &str = "57P01";

/// PostgreSQL error code for undefined table (42P01).
pub const PG_UNDEFINED_TABLE: &str = "42P01";

/// Checks if a sqlx error has a specific PostgreSQL error code.
pub fn has_pg_error_code(err: &SqlxError, code: &str) -> bool {
    pg_error_code(err).as_deref() == Some(code)
}

/// Checks if a sqlx error is "undefined table" (42P01).
pub fn is_undefined_table(err: &SqlxError) -> bool {
    has_pg_error_code(err, PG_UNDEFINED_TABLE)
}

fn pg_error_code(err: &SqlxError) -> Option<String> {
    if let SqlxError::Database(db_err) = err {
        db_err.code().map(|c| c.into_owned())
    } else {
        None
    }
}

/// Errors specific to the PostgreSQL storage backend.
#[derive(Debug, thiserror::Error)]
pub enum PostgresError {
    /// Database connection error.
    #[error("Database connection error: {0}")]
    Connection(#[from] sqlx_core::error::Error),

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl PostgresError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

impl From<PostgresError> for StorageError {
    fn from(err: PostgresError) -> Self {
        match err {
            PostgresError::Connection(e) => StorageError::connection_error(e.to_string()),
            PostgresError::Config { message } => {
                StorageError::internal(format!("Configuration error: {message}"))
            }
        }
    }
}

/// Classifies a sqlx error raised while writing to `table`.
///
/// Anything that means the server, pool or schema is gone maps to a
/// connection error so the sync stops the batch; everything else is a
/// row-level failure.
pub fn map_sqlx_error(table: &str, err: SqlxError) -> StorageError {
    if is_undefined_table(&err) {
        return StorageError::connection_error(format!("{table} is not available: {err}"));
    }
    match &err {
        SqlxError::Io(_)
        | SqlxError::Tls(_)
        | SqlxError::Protocol(_)
        | SqlxError::PoolTimedOut
        | SqlxError::PoolClosed
        | SqlxError::WorkerCrashed => StorageError::connection_error(err.to_string()),
        SqlxError::Database(_) => match pg_error_code(&err) {
            Some(code)
                if code.starts_with(PG_CONNECTION_EXCEPTION_CLASS) || code == PG_ADMIN_SHUTDOWN =>
            {
                StorageError::connection_error(err.to_string())
            }
            Some(code) if code.starts_with(PG_INTEGRITY_CONSTRAINT_CLASS) => {
                StorageError::constraint(table, err.to_string())
            }
            _ => StorageError::internal(format!("{table}: {err}")),
        },
        _ => StorageError::internal(format!("{table}: {err}")),
    }
}

/// Result type alias for PostgreSQL operations.
pub type Result<T> = std::result::Result<T, PostgresError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PostgresError::config("invalid URL");
        assert!(err.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_conversion_to_storage_error() {
        let pg_err = PostgresError::config("test error");
        let storage_err: StorageError = pg_err.into();
        assert!(matches!(storage_err, StorageError::Internal { .. }));

        let pg_err = PostgresError::Connection(SqlxError::PoolTimedOut);
        let storage_err: StorageError = pg_err.into();
        assert!(storage_err.is_systemic());
    }

    #[test]
    fn test_pool_errors_are_systemic() {
        assert!(map_sqlx_error("pbx_system", SqlxError::PoolTimedOut).is_systemic());
        assert!(map_sqlx_error("pbx_system", SqlxError::PoolClosed).is_systemic());
        assert!(!map_sqlx_error("pbx_system", SqlxError::RowNotFound).is_systemic());
    }
}
