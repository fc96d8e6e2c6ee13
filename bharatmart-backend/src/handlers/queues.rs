use std::sync::Arc;

use axum::extract::Extension;
use axum::response::Json;
use serde_json::{json, Value};

use crate::{error::ApiError, state::AppState};

/// GET /queues/stats
/// Job counts per state for the order, email and payment queues.
pub async fn stats(Extension(state): Extension<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let report = state.queues.stats().await?;
    Ok(Json(json!({
        "broker": state.queues.client().broker_name(),
        "orders": report.orders,
        "emails": report.emails,
        "payments": report.payments,
    })))
}
