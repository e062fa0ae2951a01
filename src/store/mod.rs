//! The row store boundary: a thin typed adapter over SQLite plus the
//! per-tenant database registry.

pub mod adapter;
pub mod tenancy;

pub use adapter::{ExecOutcome, StoreAdapter, TxHandle};
pub use tenancy::GraphDb;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid tenant name '{0}': only letters, digits, '-' and '_' are allowed")]
    InvalidTenantName(String),
    #[error("corrupt stored row: {0}")]
    Decode(String),
    #[error("{0}")]
    ConstraintViolation(String),
}
