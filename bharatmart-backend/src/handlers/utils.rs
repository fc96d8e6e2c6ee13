use std::collections::HashMap;

use axum::extract::{Json, Query};
use serde_json::Value;

use crate::error::ApiError;

pub const DEFAULT_PAGE_SIZE: u64 = 20;
pub const MAX_PAGE_SIZE: u64 = 100;

pub fn parse_positive_u64(raw: Option<&String>, fallback: u64, field: &str) -> Result<u64, ApiError> {
    match raw {
        Some(value) => {
            let parsed = value.trim().parse::<u64>().map_err(|_| {
                ApiError::bad_request(format!("{field} must be a positive integer"))
            })?;
            if parsed == 0 {
                return Err(ApiError::bad_request(format!("{field} must be at least 1")));
            }
            Ok(parsed)
        }
        None => Ok(fallback),
    }
}

pub fn parse_offset(raw: Option<&String>) -> Result<u64, ApiError> {
    match raw {
        Some(value) => value
            .trim()
            .parse::<u64>()
            .map_err(|_| ApiError::bad_request("offset must be a non-negative integer")),
        None => Ok(0),
    }
}

/// `(limit, offset)` from `?limit=&offset=`, limit clamped to [`MAX_PAGE_SIZE`].
pub fn pagination(params: &HashMap<String, String>) -> Result<(u64, u64), ApiError> {
    let limit = parse_positive_u64(params.get("limit"), DEFAULT_PAGE_SIZE, "limit")?;
    let offset = parse_offset(params.get("offset"))?;
    Ok((limit.min(MAX_PAGE_SIZE), offset))
}

/// Query parameters or an empty map.
pub fn query_map(query: Option<Query<HashMap<String, String>>>) -> HashMap<String, String> {
    query.map(|q| q.0).unwrap_or_default()
}

pub fn require_body(body: Option<Json<Value>>) -> Result<Value, ApiError> {
    body.map(|b| b.0)
        .ok_or_else(|| ApiError::bad_request("missing request body"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn pagination_defaults_and_clamps() {
        assert_eq!(pagination(&params(&[])).unwrap(), (DEFAULT_PAGE_SIZE, 0));
        assert_eq!(
            pagination(&params(&[("limit", "500"), ("offset", "40")])).unwrap(),
            (MAX_PAGE_SIZE, 40)
        );
    }

    #[test]
    fn pagination_rejects_garbage() {
        assert!(pagination(&params(&[("limit", "0")])).is_err());
        assert!(pagination(&params(&[("limit", "ten")])).is_err());
        assert!(pagination(&params(&[("offset", "-1")])).is_err());
    }
}
