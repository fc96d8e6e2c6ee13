use std::sync::Arc;

use axum::extract::Extension;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use bharatmart_db::repo::orders::{self, NewOrder};
use bharatmart_jobs::OrderProcessingJob;
use serde_json::{json, Value};

use super::dto::CreateOrder;
use crate::handlers::auth::utils::{require_user, user_id};
use crate::handlers::background::enqueue_outcome;
use crate::handlers::utils::require_body;
use crate::{error::ApiError, state::AppState};

/// POST /orders
/// Places the order and hands confirmation off to the order-processing queue.
pub async fn create(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    body: Option<Json<Value>>,
) -> Result<Response, ApiError> {
    let auth = require_user(&state, &headers).await?;
    let dto: CreateOrder = serde_json::from_value(require_body(body)?)?;
    if dto.items.is_empty() {
        return Err(ApiError::bad_request("order must contain at least one item"));
    }

    let order = orders::create_with_items(
        state.db.as_ref(),
        NewOrder {
            user_id: user_id(&auth)?.to_owned(),
            lines: dto.lines(),
            shipping_address: dto.shipping_address.clone(),
        },
    )
    .await?;

    let job = OrderProcessingJob::from_order(&order);
    let background = enqueue_outcome(state.queues.add_order(&job).await, &order.id);

    Ok((
        StatusCode::CREATED,
        Json(json!({ "order": order, "processing": background })),
    )
        .into_response())
}
