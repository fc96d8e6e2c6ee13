use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Extension, Query};
use axum::http::HeaderMap;
use axum::response::Json;
use bharatmart_db::models::Payment;
use bharatmart_db::repo::{orders, payments};
use serde_json::{json, Value};

use crate::handlers::auth::utils::{require_user, user_id};
use crate::handlers::utils::{pagination, query_map};
use crate::{error::ApiError, state::AppState};

/// GET /payments
/// `?orderId=` narrows to one order. Without it, admins page through every
/// payment and customers get the payments of their own orders.
pub async fn list(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    query: Result<Query<HashMap<String, String>>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let auth = require_user(&state, &headers).await?;
    let params = query_map(query.ok());
    let (limit, offset) = pagination(&params)?;
    let db = state.db.as_ref();

    let order_id = params.get("orderId").or_else(|| params.get("order_id"));
    let rows: Vec<Payment> = if let Some(order_id) = order_id {
        let order = orders::get(db, order_id)
            .await?
            .ok_or_else(|| ApiError::not_found("order not found"))?;
        if !auth.can_access(&order.user_id) {
            return Err(ApiError::forbidden("not your order"));
        }
        payments::list_for_order(db, order_id).await?
    } else if auth.is_admin() {
        payments::list(db, limit, offset).await?
    } else {
        let mut rows = Vec::new();
        for order in orders::list(db, Some(user_id(&auth)?), limit, offset).await? {
            rows.extend(payments::list_for_order(db, &order.id).await?);
        }
        rows
    };

    Ok(Json(json!({ "payments": rows, "count": rows.len() })))
}
