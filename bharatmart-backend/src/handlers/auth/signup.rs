use std::sync::Arc;

use axum::extract::Extension;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use bharatmart_db::models::Role;
use bharatmart_db::repo::users::{self, NewUser};
use serde_json::json;

use crate::validation::{check_email, check_password, into_result};
use crate::{error::ApiError, state::AppState};

/// POST /auth/signup
/// Creates a customer account and signs it in.
pub async fn signup(
    Extension(state): Extension<Arc<AppState>>,
    body: Option<Json<serde_json::Value>>,
) -> Result<Response, ApiError> {
    let payload = body
        .ok_or_else(|| ApiError::bad_request("missing request body"))?
        .0;
    let dto: super::dto::Signup = serde_json::from_value(payload)?;

    let mut issues = Vec::new();
    check_email(&mut issues, dto.email.as_deref());
    check_password(&mut issues, dto.password.as_deref());
    into_result(issues)?;

    let (Some(email), Some(password)) = (dto.email, dto.password) else {
        return Err(ApiError::bad_request("email and password are required"));
    };

    let password_hash = state.hasher.hash(&password)?;
    let user = users::create(
        state.db.as_ref(),
        NewUser {
            email,
            password_hash,
            role: Role::Customer,
            full_name: dto.full_name,
            phone: dto.phone,
            address: dto.address,
        },
    )
    .await?;

    let tokens = state.tokens.issue_pair(&user.id, user.role.as_str())?;
    tracing::info!(user_id = %user.id, "signup completed");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "user": user.public(),
            "token": tokens.token,
            "refreshToken": tokens.refresh_token,
            "expiresIn": tokens.expires_in,
        })),
    )
        .into_response())
}
