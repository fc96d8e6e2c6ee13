use std::sync::Arc;

use axum::extract::Extension;
use axum::response::Json;
use bharatmart_auth::PasswordError;
use bharatmart_db::repo::users;
use serde_json::{json, Value};

use crate::{error::ApiError, state::AppState};

/// POST /auth/login
/// Accepts { email, password } and returns the user with a fresh token pair.
pub async fn login(
    Extension(state): Extension<Arc<AppState>>,
    body: Option<Json<Value>>,
) -> Result<Json<Value>, ApiError> {
    let payload = body
        .ok_or_else(|| ApiError::bad_request("missing request body"))?
        .0;
    let dto: super::dto::Login = serde_json::from_value(payload)?;

    let (Some(email), Some(password)) = (
        dto.email.filter(|e| !e.trim().is_empty()),
        dto.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::bad_request("email and password are required"));
    };

    let user = users::find_by_email(state.db.as_ref(), &email).await?;

    // Unknown users still pay for a hash so both failures take the same path.
    let stored_hash = user.as_ref().and_then(|u| u.password.as_deref());
    match state.hasher.verify_user(&password, stored_hash) {
        Ok(()) => {}
        Err(PasswordError::HashingFailed(e)) => {
            return Err(ApiError::Password(PasswordError::HashingFailed(e)))
        }
        Err(_) => {
            tracing::debug!(found = user.is_some(), "login rejected");
            return Err(ApiError::InvalidCredentials);
        }
    }
    let user = user.ok_or(ApiError::InvalidCredentials)?;

    let tokens = state.tokens.issue_pair(&user.id, user.role.as_str())?;
    tracing::info!(user_id = %user.id, role = %user.role, "login succeeded");

    Ok(Json(json!({
        "user": user.public(),
        "token": tokens.token,
        "refreshToken": tokens.refresh_token,
        "expiresIn": tokens.expires_in,
    })))
}
