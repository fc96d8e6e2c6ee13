use std::sync::Arc;

use axum::extract::Extension;
use axum::http::HeaderMap;
use axum::response::Json;
use bharatmart_db::repo::users;
use serde_json::{json, Value};

use crate::handlers::auth::utils::{require_user, user_id};
use crate::{error::ApiError, state::AppState};

/// GET /auth/me
pub async fn me(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let auth = require_user(&state, &headers).await?;
    let user = users::find_by_id(state.db.as_ref(), user_id(&auth)?)
        .await?
        .ok_or_else(ApiError::unauthorized)?;
    Ok(Json(json!({ "user": user.public() })))
}
