use axum::response::Json;
use serde_json::{json, Value};

/// POST /auth/logout
/// Tokens are stateless; clients discard them.
pub async fn logout() -> Json<Value> {
    Json(json!({ "message": "Logged out successfully" }))
}
