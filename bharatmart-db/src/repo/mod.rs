//! Typed data access on top of [`DatabaseAdapter`](crate::DatabaseAdapter).
//!
//! Every function takes `&dyn DatabaseAdapter` and only uses the portable
//! contract, so it behaves the same on all backends.

pub mod orders;
pub mod payments;
pub mod products;
pub mod users;

use thiserror::Error;

use crate::error::DbError;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Invalid(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

/// Unwrap a `json!` object literal into a record.
pub(crate) fn record(value: serde_json::Value) -> crate::types::Record {
    match value {
        serde_json::Value::Object(map) => map,
        _ => crate::types::Record::new(),
    }
}

/// Whether a backend error is a unique-constraint violation.
pub(crate) fn is_unique_violation(err: &DbError) -> bool {
    let msg = match err {
        DbError::Query(m) => m,
        DbError::Remote { message, .. } => message,
        _ => return false,
    };
    let msg = msg.to_ascii_lowercase();
    msg.contains("unique") || msg.contains("duplicate key")
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use bharatmart_db_connection::DbConnectionConfig;

    use crate::adapter::DatabaseAdapter;
    use crate::backends::SqliteAdapter;

    pub async fn memory_db() -> Arc<dyn DatabaseAdapter> {
        let adapter = SqliteAdapter::new(DbConnectionConfig::new("sqlite::memory:"));
        adapter.initialize().await.expect("initialize sqlite");
        Arc::new(adapter)
    }
}
