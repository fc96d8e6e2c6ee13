use std::sync::Arc;

use axum::extract::Extension;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use bharatmart_db::repo::products::{self, NewProduct};
use serde_json::{json, Value};

use super::invalidate;
use crate::handlers::auth::utils::require_admin;
use crate::handlers::utils::require_body;
use crate::{error::ApiError, state::AppState};

/// POST /products (admin)
pub async fn create(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    body: Option<Json<Value>>,
) -> Result<Response, ApiError> {
    let auth = require_admin(&state, &headers).await?;
    let new: NewProduct = serde_json::from_value(require_body(body)?)?;

    let product = products::create(state.db.as_ref(), new).await?;
    invalidate(&state).await;
    tracing::info!(product_id = %product.id, admin = ?auth.user_id, "product created");

    Ok((StatusCode::CREATED, Json(json!({ "product": product }))).into_response())
}
