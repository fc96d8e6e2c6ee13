use std::sync::Arc;

use axum::extract::{Extension, Path};
use axum::http::HeaderMap;
use axum::response::Json;
use bharatmart_db::repo::products::{self, ProductPatch};
use serde_json::{json, Value};

use super::invalidate;
use crate::handlers::auth::utils::require_admin;
use crate::handlers::utils::require_body;
use crate::{error::ApiError, state::AppState};

/// PUT /products/{id} (admin)
pub async fn update(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Option<Json<Value>>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &headers).await?;
    let patch: ProductPatch = serde_json::from_value(require_body(body)?)?;

    let product = products::update(state.db.as_ref(), &id, patch)
        .await?
        .ok_or_else(|| ApiError::not_found("product not found"))?;
    invalidate(&state).await;

    Ok(Json(json!({ "product": product })))
}
