use std::sync::Arc;

use axum::extract::{Extension, Path};
use axum::http::HeaderMap;
use axum::response::Json;
use bharatmart_db::repo::{orders, payments};
use serde_json::{json, Value};

use crate::handlers::auth::utils::require_user;
use crate::{error::ApiError, state::AppState};

/// GET /orders/{id}
/// Customers may only read their own orders.
pub async fn get(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let auth = require_user(&state, &headers).await?;

    let order = orders::get(state.db.as_ref(), &id)
        .await?
        .ok_or_else(|| ApiError::not_found("order not found"))?;
    if !auth.can_access(&order.user_id) {
        return Err(ApiError::forbidden("not your order"));
    }

    let payments = payments::list_for_order(state.db.as_ref(), &order.id).await?;
    Ok(Json(json!({ "order": order, "payments": payments })))
}
