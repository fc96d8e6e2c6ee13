use std::sync::Arc;

use axum::extract::{Extension, Path};
use axum::response::Json;
use bharatmart_db::repo::products;
use serde_json::{json, Value};

use super::{cache_ttl, item_cache_key};
use crate::{error::ApiError, state::AppState};

/// GET /products/{id}
pub async fn get(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let key = item_cache_key(&id);
    if let Some(cached) = state.cache.get(&key).await {
        return Ok(Json(cached));
    }

    let product = products::get(state.db.as_ref(), &id)
        .await?
        .ok_or_else(|| ApiError::not_found("product not found"))?;
    let body = json!({ "product": product });
    state.cache.set(&key, &body, cache_ttl(&state)).await;
    Ok(Json(body))
}
