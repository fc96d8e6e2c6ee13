use std::sync::Arc;

use axum::extract::Extension;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use bharatmart_cache::CacheHealth;
use serde_json::json;

use crate::state::AppState;

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// GET /health
/// Liveness only: the process is up and serving.
pub async fn health(Extension(state): Extension<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "ok": true,
        "status": "ok",
        "database": state.database_kind().to_string(),
        "timestamp": now(),
    }))
}

/// GET /health/ready
/// Probes the database (503 when it fails) and reports cache and queue state.
/// Raw backend errors stay in the logs.
pub async fn ready(Extension(state): Extension<Arc<AppState>>) -> Response {
    let db = state.db.health().await;
    if !db.healthy {
        tracing::warn!(backend = %db.backend, detail = ?db.detail, "readiness check: database unhealthy");
    }

    let cache = state.cache.health().await;
    if cache == CacheHealth::Unreachable {
        tracing::warn!("readiness check: cache unreachable");
    }

    let queue = match state.queues.client().ping().await {
        Ok(()) => "ok",
        Err(e) => {
            tracing::warn!(error = %e, "readiness check: job queue unavailable");
            "unavailable"
        }
    };

    let status = if db.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let body = json!({
        "status": if db.healthy { "ready" } else { "not ready" },
        "timestamp": now(),
        "checks": {
            "database": if db.healthy { "ok" } else { "failed" },
            "databaseType": db.backend.to_string(),
            "cache": cache,
            "queue": queue,
            "service": "ok",
        },
    });
    (status, Json(body)).into_response()
}
