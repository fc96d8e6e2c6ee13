use std::sync::Arc;

use axum::extract::Extension;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use bharatmart_db::models::PaymentStatus;
use bharatmart_db::repo::{orders, payments};
use bharatmart_jobs::PaymentProcessingJob;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::handlers::auth::utils::require_user;
use crate::handlers::background::enqueue_outcome;
use crate::handlers::utils::require_body;
use crate::{error::ApiError, state::AppState};

pub const DEFAULT_PAYMENT_METHOD: &str = "card";

#[derive(Debug, Deserialize)]
pub struct CreatePayment {
    #[serde(alias = "orderId")]
    pub order_id: String,
    #[serde(default, alias = "paymentMethod")]
    pub payment_method: Option<String>,
    /// Defaults to the order total.
    #[serde(default)]
    pub amount: Option<f64>,
}

/// POST /payments
/// Records a pending payment and queues it for settlement.
pub async fn create(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    body: Option<Json<Value>>,
) -> Result<Response, ApiError> {
    let auth = require_user(&state, &headers).await?;
    let dto: CreatePayment = serde_json::from_value(require_body(body)?)?;

    let order = orders::get(state.db.as_ref(), &dto.order_id)
        .await?
        .ok_or_else(|| ApiError::not_found("order not found"))?;
    if !auth.can_access(&order.user_id) {
        return Err(ApiError::forbidden("not your order"));
    }
    if order.payment_status == PaymentStatus::Completed {
        return Err(ApiError::Conflict("order already paid".into()));
    }

    let method = dto
        .payment_method
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_PAYMENT_METHOD.to_owned());
    let amount = dto.amount.unwrap_or(order.total_amount);
    let payment =
        payments::create(state.db.as_ref(), &order.id, amount, Some(method.clone())).await?;

    let job = PaymentProcessingJob {
        order_id: order.id.clone(),
        amount,
        payment_method: method,
        user_id: order.user_id.clone(),
    };
    let background = enqueue_outcome(state.queues.add_payment(&job).await, &payment.id);

    Ok((
        StatusCode::CREATED,
        Json(json!({ "payment": payment, "processing": background })),
    )
        .into_response())
}
