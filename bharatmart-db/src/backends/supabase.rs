use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::adapter::{prepare_insert, prepare_update, DatabaseAdapter};
use crate::error::{DbError, DbResult};
use crate::sql::{inline_params, validate_identifier};
use crate::types::{AdapterHealth, DatabaseKind, Record, SelectOptions};

const BACKEND: &str = "supabase";
const JWT_PREFIX: &str = "eyJhbGciOi";

/// PostgREST filter operand for an equality match.
pub(crate) fn postgrest_eq(value: &Value) -> String {
    match value {
        Value::Null => "is.null".to_owned(),
        Value::String(s) => format!("eq.{}", s),
        other => format!("eq.{}", other),
    }
}

/// Supabase over its PostgREST API, authenticated with the service-role key.
///
/// Raw SQL runs through the `exec_sql` RPC function, which must exist in the
/// target project. There is no multi-request transaction support.
#[derive(Debug, Clone)]
pub struct SupabaseAdapter {
    client: Client,
    base_url: String,
    service_key: String,
}

impl SupabaseAdapter {
    pub fn new(url: &str, service_role_key: &str) -> DbResult<Self> {
        let base_url = url.trim().trim_end_matches('/').to_owned();
        if base_url.is_empty() || service_role_key.trim().is_empty() {
            return Err(DbError::Connection(
                "SUPABASE_URL and SUPABASE_SERVICE_ROLE_KEY must both be set".into(),
            ));
        }
        if !service_role_key.starts_with(JWT_PREFIX) {
            return Err(DbError::Connection(
                "supabase service role key does not look like a JWT".into(),
            ));
        }
        let client = Client::builder()
            .user_agent(concat!("bharatmart/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| DbError::Connection(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url,
            service_key: service_role_key.to_owned(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/rest/v1/{}", self.base_url, path))
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .header("Prefer", "return=representation")
    }

    fn table_path(table: &str) -> DbResult<&str> {
        validate_identifier(table)
    }

    async fn records(response: Response) -> DbResult<Vec<Record>> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, body = %body, "supabase request failed");
            return Err(DbError::Remote {
                backend: BACKEND,
                message: format!("{}: {}", status, body),
            });
        }
        let body: Value = response.json().await.map_err(|e| DbError::Remote {
            backend: BACKEND,
            message: e.to_string(),
        })?;
        Ok(match body {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|v| match v {
                    Value::Object(map) => Some(map),
                    _ => None,
                })
                .collect(),
            Value::Object(map) => vec![map],
            _ => Vec::new(),
        })
    }

    async fn rpc_exec_sql(&self, sql: &str, params: &[Value]) -> DbResult<Vec<Record>> {
        let sql = inline_params(sql, params)?;
        debug!(sql = %sql, "supabase exec_sql");
        let response = self
            .request(Method::POST, "rpc/exec_sql")
            .json(&serde_json::json!({ "sql": sql }))
            .send()
            .await?;
        Self::records(response).await
    }
}

#[async_trait]
impl DatabaseAdapter for SupabaseAdapter {
    fn kind(&self) -> DatabaseKind {
        DatabaseKind::Supabase
    }

    async fn initialize(&self) -> DbResult<()> {
        let health = self.health().await;
        if !health.healthy {
            return Err(DbError::Connection(
                health.detail.unwrap_or_else(|| "supabase unreachable".into()),
            ));
        }
        info!(url = %self.base_url, "supabase adapter initialized");
        Ok(())
    }

    async fn query(&self, sql: &str, params: &[Value]) -> DbResult<Vec<Record>> {
        self.rpc_exec_sql(sql, params).await
    }

    /// `exec_sql` returns no row counts, so this reports the rows it echoed back.
    async fn execute(&self, sql: &str, params: &[Value]) -> DbResult<u64> {
        Ok(self.rpc_exec_sql(sql, params).await?.len() as u64)
    }

    async fn insert(&self, table: &str, record: Record) -> DbResult<Option<Record>> {
        let record = prepare_insert(table, record);
        let response = self
            .request(Method::POST, Self::table_path(table)?)
            .json(&record)
            .send()
            .await?;
        Ok(Self::records(response).await?.into_iter().next())
    }

    async fn update(&self, table: &str, id: &str, patch: Record) -> DbResult<Option<Record>> {
        let patch = prepare_update(table, patch);
        let response = self
            .request(Method::PATCH, Self::table_path(table)?)
            .query(&[("id", format!("eq.{}", id))])
            .json(&patch)
            .send()
            .await?;
        Ok(Self::records(response).await?.into_iter().next())
    }

    async fn delete(&self, table: &str, id: &str) -> DbResult<Option<Record>> {
        let response = self
            .request(Method::DELETE, Self::table_path(table)?)
            .query(&[("id", format!("eq.{}", id))])
            .send()
            .await?;
        Ok(Self::records(response).await?.into_iter().next())
    }

    async fn select(&self, table: &str, options: &SelectOptions) -> DbResult<Vec<Record>> {
        let query = select_query(options)?;
        let response = self
            .request(Method::GET, Self::table_path(table)?)
            .query(&query)
            .send()
            .await?;
        Self::records(response).await
    }

    async fn health(&self) -> AdapterHealth {
        let ping = self
            .request(Method::GET, "users")
            .query(&[("select", "id"), ("limit", "1")])
            .send()
            .await;
        let detail = match ping {
            Ok(r) if r.status().is_success() => None,
            Ok(r) => Some(format!("supabase responded with {}", r.status())),
            Err(e) => Some(e.to_string()),
        };
        AdapterHealth {
            backend: DatabaseKind::Supabase,
            healthy: detail.is_none(),
            detail,
        }
    }

    async fn close(&self) -> DbResult<()> {
        Ok(())
    }
}

/// Translate [`SelectOptions`] into PostgREST query parameters.
pub(crate) fn select_query(options: &SelectOptions) -> DbResult<Vec<(String, String)>> {
    let mut query = Vec::new();
    let columns = match &options.columns {
        Some(cols) if !cols.is_empty() => {
            for c in cols {
                validate_identifier(c)?;
            }
            cols.join(",")
        }
        _ => "*".to_owned(),
    };
    query.push(("select".to_owned(), columns));
    for (column, value) in &options.filters {
        validate_identifier(column)?;
        query.push((column.clone(), postgrest_eq(value)));
    }
    if let Some(order) = &options.order_by {
        validate_identifier(&order.column)?;
        let dir = if order.ascending { "asc" } else { "desc" };
        query.push(("order".to_owned(), format!("{}.{}", order.column, dir)));
    }
    if let Some(limit) = options.limit {
        query.push(("limit".to_owned(), limit.to_string()));
    }
    if let Some(offset) = options.offset {
        query.push(("offset".to_owned(), offset.to_string()));
    }
    Ok(query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_missing_or_malformed_credentials() {
        assert!(matches!(
            SupabaseAdapter::new("", "eyJhbGciOiJIUzI1NiJ9"),
            Err(DbError::Connection(_))
        ));
        assert!(matches!(
            SupabaseAdapter::new("https://x.supabase.co", "anon-key"),
            Err(DbError::Connection(_))
        ));
        assert!(SupabaseAdapter::new("https://x.supabase.co/", "eyJhbGciOiJIUzI1NiJ9").is_ok());
    }

    #[test]
    fn select_options_become_postgrest_params() {
        let opts = SelectOptions::new()
            .filter("category", "electronics")
            .filter("image_url", Value::Null)
            .order_by("price", true)
            .limit(10);
        let q = select_query(&opts).unwrap();
        assert_eq!(q[0], ("select".into(), "*".into()));
        assert!(q.contains(&("category".into(), "eq.electronics".into())));
        assert!(q.contains(&("image_url".into(), "is.null".into())));
        assert!(q.contains(&("order".into(), "price.asc".into())));
        assert!(q.contains(&("limit".into(), "10".into())));
        assert_eq!(postgrest_eq(&json!(5)), "eq.5");
    }

    #[tokio::test]
    async fn transactions_are_unsupported() {
        let adapter = SupabaseAdapter::new("https://x.supabase.co", "eyJhbGciOiJIUzI1NiJ9").unwrap();
        assert!(matches!(
            adapter.begin().await,
            Err(DbError::TransactionsUnsupported("supabase"))
        ));
    }
}
