use async_trait::async_trait;
use bharatmart_db_connection::{create_pool, DbConnectionConfig, DbPool};
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgPool, PgRow, Postgres};
use sqlx::query::Query;
use sqlx::{Column, Row, Transaction, TypeInfo};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::adapter::{prepare_insert, prepare_update, DatabaseAdapter, UnitOfWork};
use crate::error::{DbError, DbResult};
use crate::sql::{
    build_delete, build_insert, build_select, build_update, to_numbered_placeholders, Statement,
};
use crate::types::{AdapterHealth, DatabaseKind, Record, SelectOptions};

type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

#[derive(Debug)]
pub struct PostgresAdapter {
    config: DbConnectionConfig,
    pool: OnceCell<PgPool>,
}

impl PostgresAdapter {
    pub fn new(config: DbConnectionConfig) -> Self {
        Self {
            config,
            pool: OnceCell::new(),
        }
    }

    pub fn pool(&self) -> DbResult<&PgPool> {
        self.pool.get().ok_or(DbError::NotInitialized)
    }

    async fn fetch_optional(&self, stmt: &Statement) -> DbResult<Option<Record>> {
        let sql = to_numbered_placeholders(&stmt.sql);
        let row = bind_all(sqlx::query(&sql), &stmt.params)
            .fetch_optional(self.pool()?)
            .await?;
        row.as_ref().map(row_to_record).transpose()
    }
}

fn bind_value<'q>(query: PgQuery<'q>, value: &'q Value) -> PgQuery<'q> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => query.bind(i),
            None => query.bind(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => query.bind(s.as_str()),
        other => query.bind(other.to_string()),
    }
}

fn bind_all<'q>(query: PgQuery<'q>, params: &'q [Value]) -> PgQuery<'q> {
    params.iter().fold(query, bind_value)
}

fn float_value(f: Option<f64>) -> Value {
    f.and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn row_to_record(row: &PgRow) -> DbResult<Record> {
    let mut record = Record::new();
    for (i, column) in row.columns().iter().enumerate() {
        let value = match column.type_info().name() {
            "BOOL" => row.try_get::<Option<bool>, _>(i)?.map(Value::from),
            "INT2" => row.try_get::<Option<i16>, _>(i)?.map(Value::from),
            "INT4" => row.try_get::<Option<i32>, _>(i)?.map(Value::from),
            "INT8" => row.try_get::<Option<i64>, _>(i)?.map(Value::from),
            "FLOAT4" => Some(float_value(
                row.try_get::<Option<f32>, _>(i)?.map(f64::from),
            )),
            "FLOAT8" => Some(float_value(row.try_get::<Option<f64>, _>(i)?)),
            "JSON" | "JSONB" => row.try_get::<Option<Value>, _>(i)?,
            "UUID" => row
                .try_get::<Option<uuid::Uuid>, _>(i)?
                .map(|u| Value::String(u.to_string())),
            _ => match row.try_get::<Option<String>, _>(i) {
                Ok(v) => v.map(Value::String),
                Err(e) => {
                    debug!(column = column.name(), error = %e, "undecodable column, returning null");
                    None
                }
            },
        };
        record.insert(column.name().to_owned(), value.unwrap_or(Value::Null));
    }
    Ok(record)
}

#[async_trait]
impl DatabaseAdapter for PostgresAdapter {
    fn kind(&self) -> DatabaseKind {
        DatabaseKind::Postgresql
    }

    async fn initialize(&self) -> DbResult<()> {
        let pool = self
            .pool
            .get_or_try_init(|| async {
                match create_pool(&self.config).await? {
                    DbPool::Postgres(pool) => Ok(pool),
                    other => Err(DbError::Connection(format!(
                        "expected a postgres url, got a {} pool",
                        other.backend_name()
                    ))),
                }
            })
            .await?;
        bharatmart_migrations::postgres_migrator().run(pool).await?;
        info!("postgres adapter initialized");
        Ok(())
    }

    async fn query(&self, sql: &str, params: &[Value]) -> DbResult<Vec<Record>> {
        let sql = to_numbered_placeholders(sql);
        let rows = bind_all(sqlx::query(&sql), params)
            .fetch_all(self.pool()?)
            .await?;
        rows.iter().map(row_to_record).collect()
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> DbResult<u64> {
        let sql = to_numbered_placeholders(sql);
        let done = bind_all(sqlx::query(&sql), params)
            .execute(self.pool()?)
            .await?;
        Ok(done.rows_affected())
    }

    async fn insert(&self, table: &str, record: Record) -> DbResult<Option<Record>> {
        let stmt = build_insert(table, &prepare_insert(table, record))?;
        self.fetch_optional(&stmt).await
    }

    async fn update(&self, table: &str, id: &str, patch: Record) -> DbResult<Option<Record>> {
        let stmt = build_update(table, id, &prepare_update(table, patch))?;
        self.fetch_optional(&stmt).await
    }

    async fn delete(&self, table: &str, id: &str) -> DbResult<Option<Record>> {
        let stmt = build_delete(table, id)?;
        self.fetch_optional(&stmt).await
    }

    async fn select(&self, table: &str, options: &SelectOptions) -> DbResult<Vec<Record>> {
        let stmt = build_select(table, options)?;
        let sql = to_numbered_placeholders(&stmt.sql);
        let rows = bind_all(sqlx::query(&sql), &stmt.params)
            .fetch_all(self.pool()?)
            .await?;
        rows.iter().map(row_to_record).collect()
    }

    async fn begin(&self) -> DbResult<Box<dyn UnitOfWork>> {
        let tx = self.pool()?.begin().await?;
        Ok(Box::new(PostgresUnitOfWork { tx }))
    }

    async fn health(&self) -> AdapterHealth {
        let detail = match self.pool() {
            Ok(pool) => sqlx::query("SELECT 1")
                .execute(pool)
                .await
                .err()
                .map(|e| e.to_string()),
            Err(e) => Some(e.to_string()),
        };
        AdapterHealth {
            backend: DatabaseKind::Postgresql,
            healthy: detail.is_none(),
            detail,
        }
    }

    async fn close(&self) -> DbResult<()> {
        if let Some(pool) = self.pool.get() {
            pool.close().await;
        }
        Ok(())
    }
}

pub struct PostgresUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

impl PostgresUnitOfWork {
    async fn fetch_optional(&mut self, stmt: &Statement) -> DbResult<Option<Record>> {
        let sql = to_numbered_placeholders(&stmt.sql);
        let row = bind_all(sqlx::query(&sql), &stmt.params)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(row_to_record).transpose()
    }
}

#[async_trait]
impl UnitOfWork for PostgresUnitOfWork {
    async fn query(&mut self, sql: &str, params: &[Value]) -> DbResult<Vec<Record>> {
        let sql = to_numbered_placeholders(sql);
        let rows = bind_all(sqlx::query(&sql), params)
            .fetch_all(&mut *self.tx)
            .await?;
        rows.iter().map(row_to_record).collect()
    }

    async fn execute(&mut self, sql: &str, params: &[Value]) -> DbResult<u64> {
        let sql = to_numbered_placeholders(sql);
        let done = bind_all(sqlx::query(&sql), params)
            .execute(&mut *self.tx)
            .await?;
        Ok(done.rows_affected())
    }

    async fn insert(&mut self, table: &str, record: Record) -> DbResult<Option<Record>> {
        let stmt = build_insert(table, &prepare_insert(table, record))?;
        self.fetch_optional(&stmt).await
    }

    async fn update(&mut self, table: &str, id: &str, patch: Record) -> DbResult<Option<Record>> {
        let stmt = build_update(table, id, &prepare_update(table, patch))?;
        self.fetch_optional(&stmt).await
    }

    async fn commit(self: Box<Self>) -> DbResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> DbResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
