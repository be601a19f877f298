//! Storage-crate error type and the SQLite error classification used by
//! §4.3.1/§4.3.2 to decide whether a failure is a per-event error or an
//! infrastructure error.

use tablesql_core::SqliteErrorClass;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("migration failed: {0}")]
    Migration(String),

    #[error("write permit unavailable: {0}")]
    PermitUnavailable(String),

    #[error("operation canceled")]
    Canceled,

    #[error("blocking task join error: {0}")]
    Join(String),

    #[error("{0}")]
    Other(String),
}

impl From<StorageError> for tablesql_core::CoreError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Canceled => tablesql_core::CoreError::Canceled,
            other => tablesql_core::CoreError::Database(other.to_string()),
        }
    }
}

/// Classify a `rusqlite::Error` per spec §4.3.1: `{ERROR, CONSTRAINT,
/// TOOBIG, MISMATCH}` are query-execution errors; everything else is
/// infrastructure.
pub fn classify(err: &rusqlite::Error) -> SqliteErrorClass {
    use rusqlite::ffi::ErrorCode;
    use rusqlite::Error as E;

    match err {
        E::SqliteFailure(ffi_err, _) => match ffi_err.code {
            ErrorCode::ConstraintViolation => SqliteErrorClass::Constraint,
            ErrorCode::TooBig => SqliteErrorClass::TooBig,
            ErrorCode::TypeMismatch => SqliteErrorClass::Mismatch,
            ErrorCode::Unknown => SqliteErrorClass::Error,
            _ => SqliteErrorClass::Error,
        },
        E::SqlInputError { .. } | E::InvalidColumnType(..) | E::InvalidParameterName(_) => {
            SqliteErrorClass::Mismatch
        }
        _ => SqliteErrorClass::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn constraint_violation_classified() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY)")
            .unwrap();
        conn.execute("INSERT INTO t (id) VALUES (1)", []).unwrap();
        let err = conn
            .execute("INSERT INTO t (id) VALUES (1)", [])
            .unwrap_err();
        assert_eq!(classify(&err), SqliteErrorClass::Constraint);
    }
}
