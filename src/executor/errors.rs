use thiserror::Error;

use crate::cypher_parser::errors::ParseFailure;
use crate::sqlite_query_generator::errors::SqlGeneratorError;
use crate::store::StoreError;

/// The one error type `execute` surfaces. Parse errors carry their source
/// location; store errors are sanitized before they get here.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Parse(#[from] ParseFailure),
    #[error("query exceeds the maximum length of {max} characters")]
    QueryTooLong { max: usize },
    #[error(transparent)]
    Translation(#[from] SqlGeneratorError),
    #[error("{0}")]
    Store(String),
    #[error("{0}")]
    Constraint(String),
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ConstraintViolation(message) => EngineError::Constraint(message),
            StoreError::InvalidTenantName(_) => EngineError::Store(err.to_string()),
            other => EngineError::Store(sanitize(&other)),
        }
    }
}

/// Strip engine-specific phrasing before surfacing a store failure.
fn sanitize(err: &StoreError) -> String {
    match err {
        StoreError::Sqlite(rusqlite::Error::SqliteFailure(inner, _)) => {
            match inner.code {
                rusqlite::ErrorCode::ConstraintViolation => {
                    "constraint violation (foreign key or uniqueness)".to_string()
                }
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked => {
                    "database is busy".to_string()
                }
                _ => "storage operation failed".to_string(),
            }
        }
        StoreError::Decode(_) => "stored row could not be decoded".to_string(),
        StoreError::Io(_) => "storage I/O failed".to_string(),
        _ => "storage operation failed".to_string(),
    }
}
