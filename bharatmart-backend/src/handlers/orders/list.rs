use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Extension, Query};
use axum::http::HeaderMap;
use axum::response::Json;
use bharatmart_db::repo::orders;
use serde_json::{json, Value};

use crate::handlers::auth::utils::{require_user, user_id};
use crate::handlers::utils::{pagination, query_map};
use crate::{error::ApiError, state::AppState};

/// GET /orders
/// Admins see every order; customers see their own.
pub async fn list(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    query: Result<Query<HashMap<String, String>>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let auth = require_user(&state, &headers).await?;
    let (limit, offset) = pagination(&query_map(query.ok()))?;

    let owner = if auth.is_admin() {
        None
    } else {
        Some(user_id(&auth)?)
    };
    let rows = orders::list(state.db.as_ref(), owner, limit, offset).await?;

    Ok(Json(json!({
        "orders": rows,
        "count": rows.len(),
        "limit": limit,
        "offset": offset,
    })))
}
