use std::str::FromStr;

use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::{debug, error, info};

use crate::config::DbConnectionConfig;
use crate::error::DbConnectionError;
use crate::utils::{is_sqlite_memory_url, sanitize_database_url, sqlite_file_path};

/// A pool for whichever SQL backend the URL selected.
#[derive(Debug, Clone)]
pub enum DbPool {
    Sqlite(SqlitePool),
    Postgres(PgPool),
}

impl DbPool {
    pub fn backend_name(&self) -> &'static str {
        match self {
            DbPool::Sqlite(_) => "sqlite",
            DbPool::Postgres(_) => "postgres",
        }
    }

    pub async fn close(&self) {
        match self {
            DbPool::Sqlite(p) => p.close().await,
            DbPool::Postgres(p) => p.close().await,
        }
    }
}

/// Creates a pool for the configured URL, logging the attempt and its outcome.
pub async fn create_pool(config: &DbConnectionConfig) -> Result<DbPool, DbConnectionError> {
    config.validate()?;
    let redacted = sanitize_database_url(&config.url);
    info!(database_url = %redacted, max_connections = config.max_connections, "creating database pool");

    let result = create_pool_inner(config).await;
    match &result {
        Ok(pool) => info!(backend = pool.backend_name(), "database pool ready"),
        Err(e) => error!(database_url = %redacted, error = %e, "database pool creation failed"),
    }
    result
}

async fn create_pool_inner(config: &DbConnectionConfig) -> Result<DbPool, DbConnectionError> {
    let url = config.url.trim();
    if url.starts_with("sqlite:") {
        create_sqlite_pool(url, config).await.map(DbPool::Sqlite)
    } else if url.starts_with("postgres://") || url.starts_with("postgresql://") {
        create_postgres_pool(url, config).await.map(DbPool::Postgres)
    } else {
        let scheme = url.split(':').next().unwrap_or_default().to_owned();
        Err(DbConnectionError::UnsupportedScheme(scheme))
    }
}

async fn create_sqlite_pool(
    url: &str,
    config: &DbConnectionConfig,
) -> Result<SqlitePool, DbConnectionError> {
    let memory = is_sqlite_memory_url(url);
    if let Some(path) = sqlite_file_path(url) {
        ensure_sqlite_db_file_exists(path)?;
    }

    let mut connect = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .foreign_keys(true);
    if !memory {
        connect = connect.journal_mode(SqliteJournalMode::Wal);
    }

    // Every in-memory connection opens its own database, so keep exactly one alive.
    let opts = if memory {
        debug!("sqlite in-memory database, pinning a single connection");
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        let mut opts = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections);
        if let Some(idle) = config.idle_timeout() {
            opts = opts.idle_timeout(idle);
        }
        opts
    };

    opts.acquire_timeout(config.connect_timeout())
        .connect_with(connect)
        .await
        .map_err(Into::into)
}

async fn create_postgres_pool(
    url: &str,
    config: &DbConnectionConfig,
) -> Result<PgPool, DbConnectionError> {
    let mut opts = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.connect_timeout())
        .test_before_acquire(config.test_before_acquire);
    if let Some(idle) = config.idle_timeout() {
        opts = opts.idle_timeout(idle);
    }
    opts.connect(url).await.map_err(Into::into)
}

fn ensure_sqlite_db_file_exists(path: &str) -> Result<(), DbConnectionError> {
    use std::fs::{create_dir_all, File};
    use std::io;
    use std::path::Path;

    let db_path = Path::new(path);
    if let Some(parent) = db_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty() && !p.exists())
    {
        create_dir_all(parent).map_err(|e| {
            DbConnectionError::FileCreation(format!(
                "failed to create parent directory '{}': {e}",
                parent.display()
            ))
        })?;
    }

    if !db_path.exists() {
        File::create(db_path).map_err(|e| {
            let msg = if e.kind() == io::ErrorKind::PermissionDenied {
                format!("permission denied creating '{}': {e}", db_path.display())
            } else {
                format!("failed to create DB file '{}': {e}", db_path.display())
            };
            DbConnectionError::FileCreation(msg)
        })?;
    }

    Ok(())
}
