use async_trait::async_trait;
use serde_json::Value;

use crate::error::{DbError, DbResult};
use crate::types::{AdapterHealth, DatabaseKind, Record, SelectOptions};

/// The data-access contract every backend implements.
///
/// Raw SQL passed to [`query`](DatabaseAdapter::query) and
/// [`execute`](DatabaseAdapter::execute) uses `?` placeholders on every
/// backend. Lookups that match nothing return `None` or an empty list, never
/// an error.
#[async_trait]
pub trait DatabaseAdapter: Send + Sync + std::fmt::Debug {
    fn kind(&self) -> DatabaseKind;

    /// Connect and prepare the schema. Fails with [`DbError::Connection`]
    /// when the backend is unreachable or misconfigured.
    async fn initialize(&self) -> DbResult<()>;

    async fn query(&self, sql: &str, params: &[Value]) -> DbResult<Vec<Record>>;

    async fn query_one(&self, sql: &str, params: &[Value]) -> DbResult<Option<Record>> {
        Ok(self.query(sql, params).await?.into_iter().next())
    }

    /// Run a statement that returns no rows. Returns the affected row count
    /// where the backend reports one.
    async fn execute(&self, sql: &str, params: &[Value]) -> DbResult<u64>;

    /// Insert a record, generating `id` when absent. Returns the stored row.
    async fn insert(&self, table: &str, record: Record) -> DbResult<Option<Record>>;

    async fn update(&self, table: &str, id: &str, patch: Record) -> DbResult<Option<Record>>;

    async fn delete(&self, table: &str, id: &str) -> DbResult<Option<Record>>;

    async fn select(&self, table: &str, options: &SelectOptions) -> DbResult<Vec<Record>>;

    /// Start an all-or-nothing unit of work. REST backends cannot offer one.
    async fn begin(&self) -> DbResult<Box<dyn UnitOfWork>> {
        Err(DbError::TransactionsUnsupported(self.kind().as_str()))
    }

    async fn health(&self) -> AdapterHealth;

    async fn close(&self) -> DbResult<()>;
}

/// A scoped transaction. Dropping it without `commit` rolls back.
#[async_trait]
pub trait UnitOfWork: Send {
    async fn query(&mut self, sql: &str, params: &[Value]) -> DbResult<Vec<Record>>;

    async fn execute(&mut self, sql: &str, params: &[Value]) -> DbResult<u64>;

    async fn insert(&mut self, table: &str, record: Record) -> DbResult<Option<Record>>;

    async fn update(&mut self, table: &str, id: &str, patch: Record) -> DbResult<Option<Record>>;

    async fn commit(self: Box<Self>) -> DbResult<()>;

    async fn rollback(self: Box<Self>) -> DbResult<()>;
}

const CREATED_AT_TABLES: &[&str] = &["users", "products", "orders", "order_items", "payments"];
const UPDATED_AT_TABLES: &[&str] = &["users", "products", "orders", "payments"];

/// Fill `id` and the schema's timestamp columns when the caller left them out.
pub fn prepare_insert(table: &str, mut record: Record) -> Record {
    let now = crate::now_timestamp();
    if !record.contains_key("id") {
        record.insert("id".into(), Value::String(uuid::Uuid::new_v4().to_string()));
    }
    if CREATED_AT_TABLES.contains(&table) && !record.contains_key("created_at") {
        record.insert("created_at".into(), Value::String(now.clone()));
    }
    if UPDATED_AT_TABLES.contains(&table) && !record.contains_key("updated_at") {
        record.insert("updated_at".into(), Value::String(now));
    }
    record
}

/// Stamp `updated_at` on a patch unless the caller set it.
pub fn prepare_update(table: &str, mut patch: Record) -> Record {
    if UPDATED_AT_TABLES.contains(&table) && !patch.contains_key("updated_at") {
        patch.insert("updated_at".into(), Value::String(crate::now_timestamp()));
    }
    patch
}
