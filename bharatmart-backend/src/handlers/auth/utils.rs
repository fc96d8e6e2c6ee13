use axum::http::HeaderMap;
use bharatmart_auth::AuthContext;
use tracing::debug;

use crate::{error::ApiError, state::AppState};

/// Raw value of the `Authorization` header, if any.
pub fn extract_auth_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToOwned::to_owned)
}

/// Authenticate the request and require a user id.
pub async fn require_user(state: &AppState, headers: &HeaderMap) -> Result<AuthContext, ApiError> {
    let auth_token = extract_auth_token(headers);

    let auth = match state
        .authenticator()
        .authenticate(auth_token.as_deref())
        .await
    {
        Ok(a) => a,
        Err(e) => {
            debug!(error = ?e, header_present = auth_token.is_some(), "authentication failure");
            return Err(ApiError::from(e));
        }
    };

    if !auth.is_authenticated() {
        return Err(ApiError::unauthorized());
    }
    Ok(auth)
}

/// Require that the request is authenticated with the admin role.
pub async fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<AuthContext, ApiError> {
    let auth = require_user(state, headers).await?;
    if !auth.is_admin() {
        return Err(ApiError::forbidden("admin access required"));
    }
    Ok(auth)
}

/// The caller's user id. Only valid on a context returned by [`require_user`].
pub fn user_id(auth: &AuthContext) -> Result<&str, ApiError> {
    auth.user_id.as_deref().ok_or_else(ApiError::unauthorized)
}
