use bharatmart_db_connection::DbConnectionError;
use thiserror::Error;

pub type DbResult<T> = Result<T, DbError>;

/// Errors surfaced by every persistence backend.
#[derive(Debug, Error)]
pub enum DbError {
    /// Backend unreachable or misconfigured. Fatal at startup.
    #[error("database connection error: {0}")]
    Connection(String),
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),
    #[error("invalid record: {0}")]
    InvalidRecord(String),
    #[error("query failed: {0}")]
    Query(String),
    #[error("unexpected response from {backend}: {message}")]
    Remote { backend: &'static str, message: String },
    #[error("{0} backend does not support transactions")]
    TransactionsUnsupported(&'static str),
    #[error("adapter has not been initialized")]
    NotInitialized,
}

impl DbError {
    /// True for failures caused by the input rather than the backend.
    pub fn is_validation(&self) -> bool {
        matches!(self, DbError::InvalidIdentifier(_) | DbError::InvalidRecord(_))
    }
}

impl From<sqlx::Error> for DbError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                DbError::Connection(e.to_string())
            }
            sqlx::Error::Database(db) => DbError::Query(db.message().to_owned()),
            other => DbError::Query(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        DbError::Connection(format!("migration failed: {e}"))
    }
}

impl From<DbConnectionError> for DbError {
    fn from(e: DbConnectionError) -> Self {
        DbError::Connection(e.to_string())
    }
}

impl From<reqwest::Error> for DbError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() {
            DbError::Connection(e.to_string())
        } else {
            DbError::Query(e.to_string())
        }
    }
}
