use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::adapter::{prepare_insert, prepare_update, DatabaseAdapter};
use crate::error::{DbError, DbResult};
use crate::sql::{inline_params, validate_identifier};
use crate::types::{AdapterHealth, DatabaseKind, Record, SelectOptions};

const BACKEND: &str = "oci-autonomous";

#[derive(Debug, Clone)]
pub struct OrdsSettings {
    pub base_url: String,
    pub schema: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Oracle Autonomous Database through Oracle REST Data Services.
///
/// Table operations use AutoREST endpoints (`/{schema}/{table}/`); raw SQL
/// goes to the REST-enabled SQL endpoint (`/{schema}/_/sql`).
#[derive(Debug, Clone)]
pub struct OciAutonomousAdapter {
    client: Client,
    settings: OrdsSettings,
}

impl OciAutonomousAdapter {
    pub fn new(mut settings: OrdsSettings) -> DbResult<Self> {
        settings.base_url = settings.base_url.trim().trim_end_matches('/').to_owned();
        if settings.base_url.is_empty() || settings.schema.trim().is_empty() {
            return Err(DbError::Connection(
                "ORDS base url and schema must be set".into(),
            ));
        }
        let client = Client::builder()
            .user_agent(concat!("bharatmart/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| DbError::Connection(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, settings })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!(
            "{}/{}/{}",
            self.settings.base_url,
            self.settings.schema.to_ascii_lowercase(),
            path
        );
        let builder = self.client.request(method, url);
        match &self.settings.username {
            Some(user) => builder.basic_auth(user, self.settings.password.as_deref()),
            None => builder,
        }
    }

    async fn json_body(response: Response) -> DbResult<Option<Value>> {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, body = %body, "ORDS request failed");
            return Err(DbError::Remote {
                backend: BACKEND,
                message: format!("{}: {}", status, body),
            });
        }
        if status == StatusCode::NO_CONTENT {
            return Ok(Some(Value::Null));
        }
        response.json().await.map(Some).map_err(|e| DbError::Remote {
            backend: BACKEND,
            message: e.to_string(),
        })
    }

    async fn get_one(&self, table: &str, id: &str) -> DbResult<Option<Record>> {
        let path = format!("{}/{}", validate_identifier(table)?, id);
        let body = Self::json_body(self.request(Method::GET, &path).send().await?).await?;
        Ok(body.and_then(|v| match v {
            Value::Object(map) => Some(normalize(map)),
            _ => None,
        }))
    }

    async fn run_sql(&self, sql: &str, params: &[Value]) -> DbResult<Value> {
        let statement = inline_params(sql, params)?;
        debug!(sql = %statement, "ORDS REST-enabled SQL");
        let response = self
            .request(Method::POST, "_/sql")
            .json(&json!({ "statementText": statement }))
            .send()
            .await?;
        Ok(Self::json_body(response).await?.unwrap_or(Value::Null))
    }
}

/// ORDS returns lowercase column names plus a `links` array we do not expose.
fn normalize(mut map: Map<String, Value>) -> Record {
    map.remove("links");
    map.into_iter()
        .map(|(k, v)| (k.to_ascii_lowercase(), v))
        .collect()
}

fn items(body: Value) -> Vec<Record> {
    match body {
        Value::Object(mut map) => match map.remove("items") {
            Some(Value::Array(items)) => items
                .into_iter()
                .filter_map(|v| match v {
                    Value::Object(m) => Some(normalize(m)),
                    _ => None,
                })
                .collect(),
            _ => vec![normalize(map)],
        },
        _ => Vec::new(),
    }
}

/// Build the AutoREST `q` filter document: equality filters plus `$orderby`.
pub(crate) fn ords_filter(options: &SelectOptions) -> DbResult<Option<String>> {
    let mut q = Map::new();
    for (column, value) in &options.filters {
        validate_identifier(column)?;
        let cond = if value.is_null() {
            json!({ "$null": null })
        } else {
            json!({ "$eq": value })
        };
        q.insert(column.to_ascii_lowercase(), cond);
    }
    if let Some(order) = &options.order_by {
        validate_identifier(&order.column)?;
        let dir = if order.ascending { "ASC" } else { "DESC" };
        let mut orderby = Map::new();
        orderby.insert(order.column.to_ascii_lowercase(), Value::from(dir));
        q.insert("$orderby".into(), Value::Object(orderby));
    }
    Ok(if q.is_empty() {
        None
    } else {
        Some(Value::Object(q).to_string())
    })
}

#[async_trait]
impl DatabaseAdapter for OciAutonomousAdapter {
    fn kind(&self) -> DatabaseKind {
        DatabaseKind::OciAutonomous
    }

    async fn initialize(&self) -> DbResult<()> {
        let health = self.health().await;
        if !health.healthy {
            return Err(DbError::Connection(
                health.detail.unwrap_or_else(|| "ORDS unreachable".into()),
            ));
        }
        info!(url = %self.settings.base_url, schema = %self.settings.schema, "oci autonomous adapter initialized");
        Ok(())
    }

    async fn query(&self, sql: &str, params: &[Value]) -> DbResult<Vec<Record>> {
        let body = self.run_sql(sql, params).await?;
        let result_set = body
            .get("items")
            .and_then(Value::as_array)
            .and_then(|stmts| stmts.first())
            .and_then(|stmt| stmt.get("resultSet"))
            .cloned()
            .unwrap_or(Value::Null);
        Ok(items(result_set))
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> DbResult<u64> {
        let body = self.run_sql(sql, params).await?;
        Ok(body
            .get("items")
            .and_then(Value::as_array)
            .and_then(|stmts| stmts.first())
            .and_then(|stmt| stmt.get("result"))
            .and_then(Value::as_u64)
            .unwrap_or(0))
    }

    async fn insert(&self, table: &str, record: Record) -> DbResult<Option<Record>> {
        let record = prepare_insert(table, record);
        let path = format!("{}/", validate_identifier(table)?);
        let response = self.request(Method::POST, &path).json(&record).send().await?;
        Ok(Self::json_body(response).await?.and_then(|v| match v {
            Value::Object(map) => Some(normalize(map)),
            _ => Some(record),
        }))
    }

    /// AutoREST PUT replaces the row, so the patch is merged onto the current one.
    async fn update(&self, table: &str, id: &str, patch: Record) -> DbResult<Option<Record>> {
        let Some(mut current) = self.get_one(table, id).await? else {
            return Ok(None);
        };
        current.extend(prepare_update(table, patch));
        let path = format!("{}/{}", validate_identifier(table)?, id);
        let response = self.request(Method::PUT, &path).json(&current).send().await?;
        Ok(Self::json_body(response).await?.map(|v| match v {
            Value::Object(map) => normalize(map),
            _ => current,
        }))
    }

    async fn delete(&self, table: &str, id: &str) -> DbResult<Option<Record>> {
        let Some(current) = self.get_one(table, id).await? else {
            return Ok(None);
        };
        let path = format!("{}/{}", validate_identifier(table)?, id);
        Self::json_body(self.request(Method::DELETE, &path).send().await?).await?;
        Ok(Some(current))
    }

    async fn select(&self, table: &str, options: &SelectOptions) -> DbResult<Vec<Record>> {
        let path = format!("{}/", validate_identifier(table)?);
        let mut query: Vec<(String, String)> = Vec::new();
        if let Some(q) = ords_filter(options)? {
            query.push(("q".into(), q));
        }
        if let Some(limit) = options.limit {
            query.push(("limit".into(), limit.to_string()));
        }
        if let Some(offset) = options.offset {
            query.push(("offset".into(), offset.to_string()));
        }
        let response = self.request(Method::GET, &path).query(&query).send().await?;
        let mut rows = items(Self::json_body(response).await?.unwrap_or(Value::Null));

        // AutoREST has no projection parameter.
        if let Some(cols) = options.columns.as_ref().filter(|c| !c.is_empty()) {
            for row in &mut rows {
                row.retain(|k, _| cols.iter().any(|c| c.eq_ignore_ascii_case(k)));
            }
        }
        Ok(rows)
    }

    async fn health(&self) -> AdapterHealth {
        let detail = match self.run_sql("SELECT 1 FROM DUAL", &[]).await {
            Ok(_) => None,
            Err(e) => Some(e.to_string()),
        };
        AdapterHealth {
            backend: DatabaseKind::OciAutonomous,
            healthy: detail.is_none(),
            detail,
        }
    }

    async fn close(&self) -> DbResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_document_includes_order() {
        let opts = SelectOptions::new()
            .filter("category", "electronics")
            .order_by("price", false);
        let q: Value = serde_json::from_str(&ords_filter(&opts).unwrap().unwrap()).unwrap();
        assert_eq!(q["category"]["$eq"], json!("electronics"));
        assert_eq!(q["$orderby"]["price"], json!("DESC"));
        assert!(ords_filter(&SelectOptions::new()).unwrap().is_none());
    }

    #[test]
    fn collection_items_are_normalized() {
        let rows = items(json!({
            "items": [{"ID": "p1", "NAME": "Phone", "links": []}],
            "hasMore": false
        }));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], json!("p1"));
        assert!(!rows[0].contains_key("links"));
    }

    #[test]
    fn requires_url_and_schema() {
        let settings = OrdsSettings {
            base_url: "https://adb.example.com/ords".into(),
            schema: String::new(),
            username: None,
            password: None,
        };
        assert!(OciAutonomousAdapter::new(settings).is_err());
    }
}
