use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Extension, Query};
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Json, Response};
use bharatmart_db::repo::products::{self, ProductQuery};
use serde_json::{json, Value};

use super::{cache_ttl, list_cache_key};
use crate::handlers::utils::{parse_offset, parse_positive_u64, query_map, MAX_PAGE_SIZE};
use crate::{error::ApiError, state::AppState};

pub const CACHE_HEADER: &str = "x-cache";

fn product_query(params: &HashMap<String, String>) -> Result<ProductQuery, ApiError> {
    let limit = match params.get("limit") {
        Some(_) => Some(parse_positive_u64(params.get("limit"), MAX_PAGE_SIZE, "limit")?),
        None => None,
    };
    let offset = match params.get("offset") {
        Some(_) => Some(parse_offset(params.get("offset"))?),
        None => None,
    };
    Ok(ProductQuery {
        category: params.get("category").cloned().filter(|c| !c.is_empty()),
        limit,
        offset,
        sort: params.get("sort").cloned(),
        order: params.get("order").map(|o| o.to_ascii_lowercase()),
    })
}

/// GET /products
/// Filter by `category`, page with `limit`/`offset`, sort with `sort`/`order`.
pub async fn list(
    Extension(state): Extension<Arc<AppState>>,
    query: Result<Query<HashMap<String, String>>, QueryRejection>,
) -> Result<Response, ApiError> {
    let params = query_map(query.ok());
    let query = product_query(&params)?;
    let key = list_cache_key(&query);

    if let Some(cached) = state.cache.get(&key).await {
        let mut resp = Json(cached).into_response();
        resp.headers_mut().insert(CACHE_HEADER, HeaderValue::from_static("HIT"));
        return Ok(resp);
    }

    let rows = products::list(state.db.as_ref(), &query).await?;
    let body: Value = json!({ "products": rows, "count": rows.len() });
    state.cache.set(&key, &body, cache_ttl(&state)).await;

    let mut resp = Json(body).into_response();
    resp.headers_mut().insert(CACHE_HEADER, HeaderValue::from_static("MISS"));
    Ok(resp)
}
