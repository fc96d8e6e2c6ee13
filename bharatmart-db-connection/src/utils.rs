use std::borrow::Cow;

use serde_json::json;

use crate::config::DbConnectionConfig;

/// SQLite DSN fragments that denote an in-memory database.
pub const SQLITE_MEMORY_PATTERNS: &[&[u8]] = &[b":memory:", b"mode=memory"];

pub fn config_metadata(config: &DbConnectionConfig) -> serde_json::Value {
    json!({
        "database_url": sanitize_database_url(&config.url).as_ref(),
        "max_connections": config.max_connections,
        "min_connections": config.min_connections,
        "connect_timeout_secs": config.connect_timeout_secs,
        "idle_timeout_secs": config.idle_timeout_secs,
    })
}

/// Redact `user:password@` from a connection URL. URLs without credentials
/// are returned borrowed.
pub fn sanitize_database_url(raw: &str) -> Cow<'_, str> {
    let Some(scheme_end) = raw.find("://") else {
        if raw.starts_with("sqlite:") {
            return Cow::Borrowed(raw);
        }
        return Cow::Borrowed("<redacted>");
    };
    let rest = &raw[scheme_end + 3..];
    let host_end = rest.find('/').unwrap_or(rest.len());
    let authority = &rest[..host_end];

    match authority.rfind('@') {
        Some(at_pos) => {
            let scheme = &raw[..scheme_end + 3];
            let host_and_rest = &rest[at_pos + 1..];
            let mut result = String::with_capacity(scheme.len() + 10 + host_and_rest.len());
            result.push_str(scheme);
            result.push_str("****:****@");
            result.push_str(host_and_rest);
            Cow::Owned(result)
        }
        None => Cow::Borrowed(raw),
    }
}

#[inline]
pub fn is_sqlite_memory_url(url: &str) -> bool {
    let bytes = url.as_bytes();
    SQLITE_MEMORY_PATTERNS.iter().any(|&pattern| {
        bytes
            .windows(pattern.len())
            .any(|w| w.eq_ignore_ascii_case(pattern))
    })
}

/// File path portion of an SQLite URL, or `None` for in-memory databases.
pub fn sqlite_file_path(url: &str) -> Option<&str> {
    if is_sqlite_memory_url(url) {
        return None;
    }
    let mut path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url);
    path = path.strip_prefix("file:").unwrap_or(path);
    if let Some(idx) = path.find('?') {
        path = &path[..idx];
    }
    let path = path.trim();
    if path.is_empty() {
        None
    } else {
        Some(path)
    }
}
