use std::sync::Arc;

use axum::extract::{Extension, Path};
use axum::http::HeaderMap;
use axum::response::Json;
use bharatmart_db::repo::{orders, payments};
use serde_json::{json, Value};

use crate::handlers::auth::utils::require_user;
use crate::{error::ApiError, state::AppState};

/// GET /payments/{id}
pub async fn get(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let auth = require_user(&state, &headers).await?;

    let payment = payments::get(state.db.as_ref(), &id)
        .await?
        .ok_or_else(|| ApiError::not_found("payment not found"))?;
    if !auth.is_admin() {
        let order = orders::get(state.db.as_ref(), &payment.order_id)
            .await?
            .ok_or_else(|| ApiError::not_found("payment not found"))?;
        if !auth.can_access(&order.user_id) {
            return Err(ApiError::forbidden("not your payment"));
        }
    }

    Ok(Json(json!({ "payment": payment })))
}
