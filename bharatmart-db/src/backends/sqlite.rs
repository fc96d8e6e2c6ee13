use std::sync::Arc;

use async_trait::async_trait;
use bharatmart_db_connection::{create_pool, DbConnectionConfig, DbPool};
use serde_json::Value;
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqlitePool, SqliteRow};
use sqlx::{Column, Row, Transaction, TypeInfo, ValueRef};
use tokio::sync::{Mutex, OnceCell, OwnedMutexGuard};
use tracing::{debug, info};

use crate::adapter::{prepare_insert, prepare_update, DatabaseAdapter, UnitOfWork};
use crate::error::{DbError, DbResult};
use crate::sql::{build_delete, build_insert, build_select, build_update, Statement};
use crate::types::{AdapterHealth, DatabaseKind, Record, SelectOptions};

type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

/// Embedded SQLite file. Writers are serialized through one async lock.
#[derive(Debug)]
pub struct SqliteAdapter {
    config: DbConnectionConfig,
    pool: OnceCell<SqlitePool>,
    write_lock: Arc<Mutex<()>>,
}

impl SqliteAdapter {
    pub fn new(config: DbConnectionConfig) -> Self {
        Self {
            config,
            pool: OnceCell::new(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Wrap an existing pool. The schema is still migrated by `initialize`.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            config: DbConnectionConfig::default(),
            pool: OnceCell::new_with(Some(pool)),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn pool(&self) -> DbResult<&SqlitePool> {
        self.pool.get().ok_or(DbError::NotInitialized)
    }

    async fn fetch_all(&self, stmt: &Statement) -> DbResult<Vec<Record>> {
        let pool = self.pool()?;
        let rows = bind_all(sqlx::query(&stmt.sql), &stmt.params)
            .fetch_all(pool)
            .await?;
        rows.iter().map(row_to_record).collect()
    }

    async fn fetch_optional_locked(&self, stmt: &Statement) -> DbResult<Option<Record>> {
        let pool = self.pool()?;
        let _guard = self.write_lock.lock().await;
        let row = bind_all(sqlx::query(&stmt.sql), &stmt.params)
            .fetch_optional(pool)
            .await?;
        row.as_ref().map(row_to_record).transpose()
    }
}

#[inline]
fn is_read_only(sql: &str) -> bool {
    let head = sql.trim_start();
    head.get(..6).is_some_and(|p| p.eq_ignore_ascii_case("select"))
}

fn bind_value<'q>(query: SqliteQuery<'q>, value: &'q Value) -> SqliteQuery<'q> {
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

fn bind_all<'q>(query: SqliteQuery<'q>, params: &'q [Value]) -> SqliteQuery<'q> {
    params.iter().fold(query, bind_value)
}

/// Decode by the stored value's dynamic type rather than the declared column type.
fn row_to_record(row: &SqliteRow) -> DbResult<Record> {
    let mut record = Record::new();
    for (i, column) in row.columns().iter().enumerate() {
        let raw = row.try_get_raw(i)?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            let type_name = raw.type_info().name().to_ascii_uppercase();
            match type_name.as_str() {
                "INTEGER" | "INT" | "BIGINT" | "BOOLEAN" => {
                    Value::from(row.try_get_unchecked::<i64, _>(i)?)
                }
                "REAL" | "FLOAT" | "DOUBLE" | "NUMERIC" => {
                    let f = row.try_get_unchecked::<f64, _>(i)?;
                    serde_json::Number::from_f64(f)
                        .map(Value::Number)
                        .unwrap_or(Value::Null)
                }
                "BLOB" => {
                    let bytes = row.try_get_unchecked::<Vec<u8>, _>(i)?;
                    Value::String(String::from_utf8_lossy(&bytes).into_owned())
                }
                _ => Value::String(row.try_get_unchecked::<String, _>(i)?),
            }
        };
        record.insert(column.name().to_owned(), value);
    }
    Ok(record)
}

#[async_trait]
impl DatabaseAdapter for SqliteAdapter {
    fn kind(&self) -> DatabaseKind {
        DatabaseKind::Sqlite
    }

    async fn initialize(&self) -> DbResult<()> {
        let pool = self
            .pool
            .get_or_try_init(|| async {
                match create_pool(&self.config).await? {
                    DbPool::Sqlite(pool) => Ok(pool),
                    other => Err(DbError::Connection(format!(
                        "expected an sqlite url, got a {} pool",
                        other.backend_name()
                    ))),
                }
            })
            .await?;
        bharatmart_migrations::sqlite_migrator().run(pool).await?;
        info!("sqlite adapter initialized");
        Ok(())
    }

    async fn query(&self, sql: &str, params: &[Value]) -> DbResult<Vec<Record>> {
        let pool = self.pool()?;
        debug!(sql, "sqlite query");
        let _guard = if is_read_only(sql) {
            None
        } else {
            Some(self.write_lock.lock().await)
        };
        let rows = bind_all(sqlx::query(sql), params).fetch_all(pool).await?;
        rows.iter().map(row_to_record).collect()
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> DbResult<u64> {
        let pool = self.pool()?;
        let _guard = self.write_lock.lock().await;
        let done = bind_all(sqlx::query(sql), params).execute(pool).await?;
        Ok(done.rows_affected())
    }

    async fn insert(&self, table: &str, record: Record) -> DbResult<Option<Record>> {
        let stmt = build_insert(table, &prepare_insert(table, record))?;
        self.fetch_optional_locked(&stmt).await
    }

    async fn update(&self, table: &str, id: &str, patch: Record) -> DbResult<Option<Record>> {
        let stmt = build_update(table, id, &prepare_update(table, patch))?;
        self.fetch_optional_locked(&stmt).await
    }

    async fn delete(&self, table: &str, id: &str) -> DbResult<Option<Record>> {
        let stmt = build_delete(table, id)?;
        self.fetch_optional_locked(&stmt).await
    }

    async fn select(&self, table: &str, options: &SelectOptions) -> DbResult<Vec<Record>> {
        let stmt = build_select(table, options)?;
        self.fetch_all(&stmt).await
    }

    async fn begin(&self) -> DbResult<Box<dyn UnitOfWork>> {
        let pool = self.pool()?;
        let guard = self.write_lock.clone().lock_owned().await;
        let tx = pool.begin().await?;
        Ok(Box::new(SqliteUnitOfWork { tx, _guard: guard }))
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
            backend: DatabaseKind::Sqlite,
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

/// Holds the writer lock for its whole lifetime.
pub struct SqliteUnitOfWork {
    tx: Transaction<'static, Sqlite>,
    _guard: OwnedMutexGuard<()>,
}

#[async_trait]
impl UnitOfWork for SqliteUnitOfWork {
    async fn query(&mut self, sql: &str, params: &[Value]) -> DbResult<Vec<Record>> {
        let rows = bind_all(sqlx::query(sql), params)
            .fetch_all(&mut *self.tx)
            .await?;
        rows.iter().map(row_to_record).collect()
    }

    async fn execute(&mut self, sql: &str, params: &[Value]) -> DbResult<u64> {
        let done = bind_all(sqlx::query(sql), params)
            .execute(&mut *self.tx)
            .await?;
        Ok(done.rows_affected())
    }

    async fn insert(&mut self, table: &str, record: Record) -> DbResult<Option<Record>> {
        let stmt = build_insert(table, &prepare_insert(table, record))?;
        let row = bind_all(sqlx::query(&stmt.sql), &stmt.params)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(row_to_record).transpose()
    }

    async fn update(&mut self, table: &str, id: &str, patch: Record) -> DbResult<Option<Record>> {
        let stmt = build_update(table, id, &prepare_update(table, patch))?;
        let row = bind_all(sqlx::query(&stmt.sql), &stmt.params)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(row_to_record).transpose()
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn memory_adapter() -> SqliteAdapter {
        let adapter = SqliteAdapter::new(DbConnectionConfig::new("sqlite::memory:"));
        adapter.initialize().await.expect("initialize");
        adapter
    }

    fn record(v: Value) -> Record {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn read_only_detection_handles_multibyte_text() {
        assert!(is_read_only("  select 1"));
        assert!(is_read_only("SELECT * FROM products"));
        assert!(!is_read_only("UPDATE products SET stock = 0"));
        assert!(!is_read_only("/*€€*/ SELECT 1"));
        assert!(!is_read_only("€"));
        assert!(!is_read_only(""));
    }

    #[tokio::test]
    async fn query_with_leading_multibyte_comment() {
        let adapter = memory_adapter().await;
        let rows = adapter.query("/*€€*/ SELECT 1 AS one", &[]).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["one"], json!(1));
    }

    async fn seed_products(adapter: &SqliteAdapter) {
        for (name, category, price) in [
            ("Phone", "electronics", 499.0),
            ("Laptop", "electronics", 999.5),
            ("Earbuds", "electronics", 49.0),
            ("Kurta", "apparel", 25.0),
        ] {
            adapter
                .insert(
                    "products",
                    record(json!({"name": name, "category": category, "price": price, "stock": 5})),
                )
                .await
                .unwrap()
                .unwrap();
        }
    }

    #[tokio::test]
    async fn insert_generates_id_and_timestamps() {
        let adapter = memory_adapter().await;
        let row = adapter
            .insert("users", record(json!({"email": "asha@example.com", "password": "x"})))
            .await
            .unwrap()
            .unwrap();
        assert!(row["id"].as_str().map(|s| !s.is_empty()).unwrap_or(false));
        assert_eq!(row["role"], json!("customer"));
        assert!(row["created_at"].is_string());
    }

    #[tokio::test]
    async fn select_filters_orders_and_limits() {
        let adapter = memory_adapter().await;
        seed_products(&adapter).await;
        let rows = adapter
            .select(
                "products",
                &SelectOptions::new()
                    .filter("category", "electronics")
                    .order_by("price", true)
                    .limit(10),
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r["category"] == json!("electronics")));
        let prices: Vec<f64> = rows.iter().map(|r| r["price"].as_f64().unwrap()).collect();
        assert_eq!(prices, vec![49.0, 499.0, 999.5]);

        let page = adapter
            .select(
                "products",
                &SelectOptions::new()
                    .columns(["name"])
                    .order_by("price", false)
                    .limit(1)
                    .offset(1),
            )
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].len(), 1);
        assert_eq!(page[0]["name"], json!("Phone"));
    }

    #[tokio::test]
    async fn missing_rows_are_none_not_errors() {
        let adapter = memory_adapter().await;
        assert!(adapter
            .update("products", "missing", record(json!({"stock": 1})))
            .await
            .unwrap()
            .is_none());
        assert!(adapter.delete("products", "missing").await.unwrap().is_none());
        assert!(adapter
            .query_one("SELECT * FROM users WHERE email = ?", &[json!("nobody@example.com")])
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn duplicate_email_is_a_query_error() {
        let adapter = memory_adapter().await;
        let user = record(json!({"email": "dup@example.com", "password": "x"}));
        adapter.insert("users", user.clone()).await.unwrap();
        let err = adapter.insert("users", user).await.unwrap_err();
        assert!(matches!(err, DbError::Query(_)));
        let count = adapter
            .query_one("SELECT COUNT(*) AS n FROM users", &[])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(count["n"], json!(1));
    }

    #[tokio::test]
    async fn rolled_back_unit_of_work_leaves_nothing() {
        let adapter = memory_adapter().await;
        let mut uow = adapter.begin().await.unwrap();
        uow.insert("products", record(json!({"name": "Tmp", "price": 1.0})))
            .await
            .unwrap();
        uow.rollback().await.unwrap();

        let rows = adapter.select("products", &SelectOptions::new()).await.unwrap();
        assert!(rows.is_empty());

        let mut uow = adapter.begin().await.unwrap();
        uow.insert("products", record(json!({"name": "Kept", "price": 2.0})))
            .await
            .unwrap();
        uow.commit().await.unwrap();
        let rows = adapter.select("products", &SelectOptions::new()).await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn health_reports_uninitialized_adapter() {
        let adapter = SqliteAdapter::new(DbConnectionConfig::new("sqlite::memory:"));
        let health = adapter.health().await;
        assert!(!health.healthy);
        let adapter = memory_adapter().await;
        assert!(adapter.health().await.healthy);
    }
}
