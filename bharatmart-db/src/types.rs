use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// A row as a column-name to JSON-value map.
pub type Record = Map<String, Value>;

/// Which persistence backend is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DatabaseKind {
    Sqlite,
    Postgresql,
    Supabase,
    OciAutonomous,
}

impl DatabaseKind {
    /// Resolve the configured backend name. Unrecognized values fall back to SQLite.
    pub fn from_config(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "sqlite" => DatabaseKind::Sqlite,
            "postgresql" | "postgres" => DatabaseKind::Postgresql,
            "supabase" => DatabaseKind::Supabase,
            "oci-autonomous" | "oci" => DatabaseKind::OciAutonomous,
            other => {
                warn!(database_type = %other, "unknown database type, falling back to sqlite");
                DatabaseKind::Sqlite
            }
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            DatabaseKind::Sqlite => "sqlite",
            DatabaseKind::Postgresql => "postgresql",
            DatabaseKind::Supabase => "supabase",
            DatabaseKind::OciAutonomous => "oci-autonomous",
        }
    }

    /// Whether `begin()` yields a real unit of work.
    pub const fn supports_transactions(self) -> bool {
        matches!(self, DatabaseKind::Sqlite | DatabaseKind::Postgresql)
    }
}

impl fmt::Display for DatabaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub column: String,
    #[serde(default = "default_true")]
    pub ascending: bool,
}

fn default_true() -> bool {
    true
}

/// Portable filtering contract honored identically by every backend.
///
/// `filters` are equality matches combined with AND; a JSON `null` matches
/// rows where the column IS NULL.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectOptions {
    #[serde(default)]
    pub columns: Option<Vec<String>>,
    #[serde(default, rename = "where")]
    pub filters: Record,
    #[serde(default)]
    pub order_by: Option<OrderBy>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub offset: Option<u64>,
}

impl SelectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn filter(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.insert(column.into(), value.into());
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.order_by = Some(OrderBy {
            column: column.into(),
            ascending,
        });
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// Result of a backend liveness check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdapterHealth {
    pub backend: DatabaseKind,
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}
