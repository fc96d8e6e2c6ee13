use std::sync::Arc;

use axum::extract::Extension;
use axum::response::Json;
use bharatmart_db::repo::users;
use serde_json::{json, Value};

use crate::{error::ApiError, state::AppState};

/// POST /auth/refresh
/// Trades a valid refresh token for a new token pair. The role is re-read
/// from the database so promotions take effect on the next refresh.
pub async fn refresh(
    Extension(state): Extension<Arc<AppState>>,
    body: Option<Json<Value>>,
) -> Result<Json<Value>, ApiError> {
    let payload = body
        .ok_or_else(|| ApiError::bad_request("missing request body"))?
        .0;
    let dto: super::dto::Refresh = serde_json::from_value(payload)?;
    let token = dto
        .refresh_token
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("refresh token required"))?;

    let user_id = state.tokens.verify_refresh(&token).map_err(|e| {
        tracing::debug!(error = %e, "refresh token rejected");
        ApiError::from(e)
    })?;

    let user = users::find_by_id(state.db.as_ref(), &user_id)
        .await?
        .ok_or_else(ApiError::unauthorized)?;

    let tokens = state.tokens.issue_pair(&user.id, user.role.as_str())?;
    Ok(Json(json!({
        "token": tokens.token,
        "refreshToken": tokens.refresh_token,
        "expiresIn": tokens.expires_in,
    })))
}
