use std::sync::Arc;

use bharatmart_db_connection::DbConnectionConfig;
use tracing::info;

use crate::adapter::DatabaseAdapter;
use crate::backends::{
    OciAutonomousAdapter, OrdsSettings, PostgresAdapter, SqliteAdapter, SupabaseAdapter,
};
use crate::error::{DbError, DbResult};
use crate::types::DatabaseKind;

/// Everything needed to construct any of the backends.
#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub kind: DatabaseKind,
    pub sqlite_path: String,
    pub url: Option<String>,
    pub max_connections: u32,
    pub supabase_url: Option<String>,
    pub supabase_service_role_key: Option<String>,
    pub ords: Option<OrdsSettings>,
}

impl DatabaseSettings {
    pub fn sqlite(path: impl Into<String>) -> Self {
        Self {
            kind: DatabaseKind::Sqlite,
            sqlite_path: path.into(),
            url: None,
            max_connections: 10,
            supabase_url: None,
            supabase_service_role_key: None,
            ords: None,
        }
    }
}

/// Construct the adapter for the configured backend without connecting.
pub fn build_adapter(settings: &DatabaseSettings) -> DbResult<Arc<dyn DatabaseAdapter>> {
    let adapter: Arc<dyn DatabaseAdapter> = match settings.kind {
        DatabaseKind::Sqlite => {
            let config = DbConnectionConfig::for_sqlite_path(&settings.sqlite_path)
                .with_max_connections(settings.max_connections);
            Arc::new(SqliteAdapter::new(config))
        }
        DatabaseKind::Postgresql => {
            let url = settings.url.as_deref().ok_or_else(|| {
                DbError::Connection("DATABASE_URL is required for postgresql".into())
            })?;
            let config = DbConnectionConfig::new(url).with_max_connections(settings.max_connections);
            Arc::new(PostgresAdapter::new(config))
        }
        DatabaseKind::Supabase => Arc::new(SupabaseAdapter::new(
            settings.supabase_url.as_deref().unwrap_or_default(),
            settings.supabase_service_role_key.as_deref().unwrap_or_default(),
        )?),
        DatabaseKind::OciAutonomous => {
            let ords = settings.ords.clone().ok_or_else(|| {
                DbError::Connection("ORDS settings are required for oci-autonomous".into())
            })?;
            Arc::new(OciAutonomousAdapter::new(ords)?)
        }
    };
    Ok(adapter)
}

/// Build and initialize the configured backend. Errors here are fatal at startup.
pub async fn connect(settings: &DatabaseSettings) -> DbResult<Arc<dyn DatabaseAdapter>> {
    info!(backend = %settings.kind, "initializing database adapter");
    let adapter = build_adapter(settings)?;
    adapter.initialize().await?;
    Ok(adapter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn postgres_without_url_fails_fast() {
        let settings = DatabaseSettings {
            kind: DatabaseKind::Postgresql,
            ..DatabaseSettings::sqlite("unused")
        };
        assert!(matches!(build_adapter(&settings), Err(DbError::Connection(_))));
    }

    #[test]
    fn supabase_without_credentials_fails_fast() {
        let settings = DatabaseSettings {
            kind: DatabaseKind::Supabase,
            ..DatabaseSettings::sqlite("unused")
        };
        assert!(matches!(build_adapter(&settings), Err(DbError::Connection(_))));
    }

    #[tokio::test]
    async fn unknown_kind_resolves_to_working_sqlite() {
        let settings = DatabaseSettings {
            kind: DatabaseKind::from_config("cassandra"),
            ..DatabaseSettings::sqlite(":memory:")
        };
        let adapter = connect(&settings).await.expect("sqlite fallback");
        assert_eq!(adapter.kind(), DatabaseKind::Sqlite);
        assert!(adapter.health().await.healthy);
    }

    #[tokio::test]
    async fn file_database_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bharatmart.db");
        let adapter = connect(&DatabaseSettings::sqlite(path.to_str().unwrap()))
            .await
            .unwrap();
        assert!(path.exists());
        adapter.close().await.unwrap();
    }
}
