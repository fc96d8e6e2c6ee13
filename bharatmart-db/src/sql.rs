//! Statement building shared by the SQL backends.
//!
//! Statements are written with `?` placeholders; the Postgres backend
//! renumbers them with [`to_numbered_placeholders`] before execution.

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::{DbError, DbResult};
use crate::types::{Record, SelectOptions};

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Reject anything that is not a plain identifier before it is spliced into SQL or a URL.
pub fn validate_identifier(name: &str) -> DbResult<&str> {
    if IDENTIFIER.is_match(name) {
        Ok(name)
    } else {
        Err(DbError::InvalidIdentifier(name.to_owned()))
    }
}

#[inline]
fn quote(name: &str) -> DbResult<String> {
    validate_identifier(name).map(|n| format!("\"{}\"", n))
}

fn push_value(sql: &mut String, params: &mut Vec<Value>, value: &Value) {
    if value.is_null() {
        sql.push_str("NULL");
    } else {
        sql.push('?');
        params.push(value.clone());
    }
}

fn push_filters(sql: &mut String, params: &mut Vec<Value>, filters: &Record) -> DbResult<()> {
    if filters.is_empty() {
        return Ok(());
    }
    sql.push_str(" WHERE ");
    for (i, (column, value)) in filters.iter().enumerate() {
        if i > 0 {
            sql.push_str(" AND ");
        }
        sql.push_str(&quote(column)?);
        if value.is_null() {
            sql.push_str(" IS NULL");
        } else {
            sql.push_str(" = ?");
            params.push(value.clone());
        }
    }
    Ok(())
}

pub fn build_select(table: &str, opts: &SelectOptions) -> DbResult<Statement> {
    let columns = match &opts.columns {
        Some(cols) if !cols.is_empty() => cols
            .iter()
            .map(|c| quote(c))
            .collect::<DbResult<Vec<_>>>()?
            .join(", "),
        _ => "*".to_owned(),
    };
    let mut sql = format!("SELECT {} FROM {}", columns, quote(table)?);
    let mut params = Vec::new();
    push_filters(&mut sql, &mut params, &opts.filters)?;

    if let Some(order) = &opts.order_by {
        sql.push_str(" ORDER BY ");
        sql.push_str(&quote(&order.column)?);
        sql.push_str(if order.ascending { " ASC" } else { " DESC" });
    }
    match (opts.limit, opts.offset) {
        (Some(limit), offset) => {
            sql.push_str(&format!(" LIMIT {}", limit));
            if let Some(offset) = offset {
                sql.push_str(&format!(" OFFSET {}", offset));
            }
        }
        // SQLite needs a LIMIT before OFFSET; -1 means unbounded there and
        // ALL is the Postgres spelling, so use the largest i64 for both.
        (None, Some(offset)) => sql.push_str(&format!(" LIMIT {} OFFSET {}", i64::MAX, offset)),
        (None, None) => {}
    }
    Ok(Statement { sql, params })
}

pub fn build_insert(table: &str, record: &Record) -> DbResult<Statement> {
    if record.is_empty() {
        return Err(DbError::InvalidRecord("insert requires at least one column".into()));
    }
    let mut columns = Vec::with_capacity(record.len());
    let mut values = String::new();
    let mut params = Vec::with_capacity(record.len());
    for (i, (column, value)) in record.iter().enumerate() {
        columns.push(quote(column)?);
        if i > 0 {
            values.push_str(", ");
        }
        push_value(&mut values, &mut params, value);
    }
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
        quote(table)?,
        columns.join(", "),
        values
    );
    Ok(Statement { sql, params })
}

pub fn build_update(table: &str, id: &str, patch: &Record) -> DbResult<Statement> {
    if patch.is_empty() {
        return Err(DbError::InvalidRecord("update requires at least one column".into()));
    }
    let mut sql = format!("UPDATE {} SET ", quote(table)?);
    let mut params = Vec::with_capacity(patch.len() + 1);
    for (i, (column, value)) in patch.iter().enumerate() {
        if column == "id" {
            return Err(DbError::InvalidRecord("id cannot be updated".into()));
        }
        if i > 0 {
            sql.push_str(", ");
        }
        sql.push_str(&quote(column)?);
        sql.push_str(" = ");
        push_value(&mut sql, &mut params, value);
    }
    sql.push_str(" WHERE \"id\" = ? RETURNING *");
    params.push(Value::String(id.to_owned()));
    Ok(Statement { sql, params })
}

pub fn build_delete(table: &str, id: &str) -> DbResult<Statement> {
    Ok(Statement {
        sql: format!("DELETE FROM {} WHERE \"id\" = ? RETURNING *", quote(table)?),
        params: vec![Value::String(id.to_owned())],
    })
}

/// Rewrite `?` placeholders to `$1..$n`, leaving quoted text alone.
pub fn to_numbered_placeholders(sql: &str) -> Cow<'_, str> {
    if !sql.contains('?') {
        return Cow::Borrowed(sql);
    }
    let mut out = String::with_capacity(sql.len() + 8);
    let mut n = 0;
    let mut quote: Option<char> = None;
    for ch in sql.chars() {
        match (quote, ch) {
            (None, '\'' | '"') => {
                quote = Some(ch);
                out.push(ch);
            }
            (Some(q), c) if c == q => {
                quote = None;
                out.push(c);
            }
            (None, '?') => {
                n += 1;
                out.push('$');
                out.push_str(&n.to_string());
            }
            (_, c) => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Render a JSON value as an SQL literal.
pub fn sql_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_owned(),
        Value::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_owned(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => format!("'{}'", s.replace('\'', "''")),
        other => format!("'{}'", other.to_string().replace('\'', "''")),
    }
}

/// Substitute `?` placeholders with literals, for backends that only accept SQL text.
pub fn inline_params(sql: &str, params: &[Value]) -> DbResult<String> {
    let mut out = String::with_capacity(sql.len() + params.len() * 8);
    let mut it = params.iter();
    let mut quote: Option<char> = None;
    for ch in sql.chars() {
        match (quote, ch) {
            (None, '\'' | '"') => {
                quote = Some(ch);
                out.push(ch);
            }
            (Some(q), c) if c == q => {
                quote = None;
                out.push(c);
            }
            (None, '?') => {
                let value = it.next().ok_or_else(|| {
                    DbError::InvalidRecord("fewer parameters than placeholders".into())
                })?;
                out.push_str(&sql_literal(value));
            }
            (_, c) => out.push(c),
        }
    }
    if it.next().is_some() {
        return Err(DbError::InvalidRecord(
            "more parameters than placeholders".into(),
        ));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(v: Value) -> Record {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn select_with_filters_order_and_paging() {
        let opts = SelectOptions::new()
            .filter("category", "electronics")
            .filter("image_url", Value::Null)
            .order_by("price", true)
            .limit(10)
            .offset(20);
        let stmt = build_select("products", &opts).unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT * FROM \"products\" WHERE \"category\" = ? AND \"image_url\" IS NULL ORDER BY \"price\" ASC LIMIT 10 OFFSET 20"
        );
        assert_eq!(stmt.params, vec![json!("electronics")]);
    }

    #[test]
    fn identifiers_are_validated() {
        let opts = SelectOptions::new().filter("name; DROP TABLE users", 1);
        assert!(matches!(
            build_select("products", &opts),
            Err(DbError::InvalidIdentifier(_))
        ));
        assert!(build_delete("users--", "x").is_err());
    }

    #[test]
    fn insert_inlines_null() {
        let stmt = build_insert("users", &record(json!({"email": "a@b.c", "phone": null}))).unwrap();
        assert_eq!(
            stmt.sql,
            "INSERT INTO \"users\" (\"email\", \"phone\") VALUES (?, NULL) RETURNING *"
        );
        assert_eq!(stmt.params.len(), 1);
    }

    #[test]
    fn update_refuses_id_change() {
        assert!(build_update("users", "u1", &record(json!({"id": "u2"}))).is_err());
        let stmt = build_update("orders", "o1", &record(json!({"status": "confirmed"}))).unwrap();
        assert_eq!(
            stmt.sql,
            "UPDATE \"orders\" SET \"status\" = ? WHERE \"id\" = ? RETURNING *"
        );
        assert_eq!(stmt.params, vec![json!("confirmed"), json!("o1")]);
    }

    #[test]
    fn numbered_placeholders_skip_literals() {
        let out = to_numbered_placeholders("SELECT '?' AS q, id FROM t WHERE a = ? AND b = ?");
        assert_eq!(out, "SELECT '?' AS q, id FROM t WHERE a = $1 AND b = $2");
    }

    #[test]
    fn inline_params_escapes_quotes() {
        let sql = inline_params("SELECT * FROM users WHERE email = ?", &[json!("o'neil@x.io")]).unwrap();
        assert_eq!(sql, "SELECT * FROM users WHERE email = 'o''neil@x.io'");
        assert!(inline_params("SELECT ?", &[]).is_err());
    }
}
