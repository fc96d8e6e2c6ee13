use std::sync::Arc;

use axum::extract::{Extension, Path};
use axum::http::HeaderMap;
use axum::response::Json;
use bharatmart_db::repo::products;
use serde_json::{json, Value};

use super::invalidate;
use crate::handlers::auth::utils::require_admin;
use crate::{error::ApiError, state::AppState};

/// DELETE /products/{id} (admin)
pub async fn delete(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &headers).await?;

    let removed = products::delete(state.db.as_ref(), &id)
        .await?
        .ok_or_else(|| ApiError::not_found("product not found"))?;
    invalidate(&state).await;
    tracing::info!(product_id = %removed.id, "product deleted");

    Ok(Json(json!({ "message": "product deleted", "id": removed.id })))
}
