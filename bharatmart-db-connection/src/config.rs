use std::env::{self, VarError};
use std::time::Duration;

use serde::Deserialize;

use crate::error::DbConnectionError;

pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_MIN_CONNECTIONS: u32 = 1;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;

/// Pool settings shared by the SQLite and Postgres backends.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DbConnectionConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: Option<u64>,
    pub test_before_acquire: bool,
}

impl Default for DbConnectionConfig {
    #[inline]
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: DEFAULT_MIN_CONNECTIONS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            idle_timeout_secs: Some(DEFAULT_IDLE_TIMEOUT_SECS),
            test_before_acquire: true,
        }
    }
}

impl DbConnectionConfig {
    #[inline]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Builds the URL for an SQLite file path. Paths that already carry a
    /// `sqlite:` scheme are used as they are.
    pub fn for_sqlite_path(path: &str) -> Self {
        if path.starts_with("sqlite:") {
            Self::new(path)
        } else if path == ":memory:" {
            Self::new("sqlite::memory:")
        } else {
            Self::new(format!("sqlite://{}", path))
        }
    }

    #[inline]
    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        if self.min_connections > max {
            self.min_connections = max;
        }
        self
    }

    /// Loads pool settings from `{PREFIX}_DATABASE_URL` and the optional
    /// `{PREFIX}_DB_MAX_CONNECTIONS`, `{PREFIX}_DB_MIN_CONNECTIONS`,
    /// `{PREFIX}_DB_CONNECT_TIMEOUT_SECS` and `{PREFIX}_DB_IDLE_TIMEOUT_SECS`.
    pub fn from_env(prefix: &str) -> Result<Self, DbConnectionError> {
        let url_var = format!("{}_DATABASE_URL", prefix);
        let url =
            env::var(&url_var).map_err(|_| DbConnectionError::MissingEnvVar(url_var.clone()))?;
        if url.trim().is_empty() {
            return Err(DbConnectionError::EmptyDatabaseUrl);
        }

        let mut config = Self::new(url);
        if let Some(max) = parse_env_u64(prefix, "DB_MAX_CONNECTIONS")? {
            config.max_connections = max as u32;
        }
        if let Some(min) = parse_env_u64(prefix, "DB_MIN_CONNECTIONS")? {
            config.min_connections = min as u32;
        }
        if let Some(secs) = parse_env_u64(prefix, "DB_CONNECT_TIMEOUT_SECS")? {
            config.connect_timeout_secs = secs;
        }
        if let Some(secs) = parse_env_u64(prefix, "DB_IDLE_TIMEOUT_SECS")? {
            config.idle_timeout_secs = Some(secs);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), DbConnectionError> {
        if self.url.trim().is_empty() {
            return Err(DbConnectionError::EmptyDatabaseUrl);
        }
        if self.max_connections == 0 {
            return Err(DbConnectionError::InvalidPoolSize(
                "max_connections must be greater than 0".to_owned(),
            ));
        }
        if self.min_connections > self.max_connections {
            return Err(DbConnectionError::InvalidPoolSize(
                "min_connections must not exceed max_connections".to_owned(),
            ));
        }
        Ok(())
    }

    #[inline]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    #[inline]
    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_secs.map(Duration::from_secs)
    }
}

fn parse_env_u64(prefix: &str, suffix: &str) -> Result<Option<u64>, DbConnectionError> {
    let var = format!("{prefix}_{suffix}");
    match env::var(&var) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            trimmed
                .parse::<u64>()
                .map(Some)
                .map_err(|source| DbConnectionError::InvalidNumber { var, source })
        }
        Err(VarError::NotPresent) => Ok(None),
        Err(VarError::NotUnicode(_)) => Err(DbConnectionError::InvalidUnicode(var)),
    }
}
