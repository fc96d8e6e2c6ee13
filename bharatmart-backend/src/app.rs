use std::sync::Arc;

use axum::extract::Extension;
use axum::http::{HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use bharatmart_config::CorsConfig;
use serde_json::json;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::handlers::{auth, health, orders, payments, products, queues};
use crate::state::AppState;

/// Build the primary axum router with the provided shared application state.
/// Everything except the `/` banner lives under `/api`.
pub fn build_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/auth/signup", post(auth::signup))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .route("/health", get(health::health))
        .route("/health/ready", get(health::ready))
        .route("/products", get(products::list).post(products::create))
        .route(
            "/products/{id}",
            get(products::get)
                .put(products::update)
                .delete(products::delete),
        )
        .route("/orders", get(orders::list).post(orders::create))
        .route("/orders/{id}", get(orders::get))
        .route("/payments", get(payments::list).post(payments::create))
        .route("/payments/{id}", get(payments::get))
        .route("/queues/stats", get(queues::stats));

    Router::new()
        .route("/", get(banner))
        .nest("/api", api)
        .fallback(not_found)
        .layer(Extension(state))
}

/// CORS policy from configuration.
pub fn cors_layer(cfg: &CorsConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);
    if cfg.allow_all_origins {
        return layer.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = cfg
        .allowed_origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
}

/// GET /
async fn banner(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "name": "BharatMart API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "database": state.database_kind().to_string(),
        "cache": state.cache.backend_name(),
        "queue": state.queues.client().broker_name(),
        "endpoints": {
            "auth": "/api/auth",
            "health": "/api/health",
            "ready": "/api/health/ready",
            "products": "/api/products",
            "orders": "/api/orders",
            "payments": "/api/payments",
            "queues": "/api/queues/stats",
        },
    }))
}

async fn not_found(uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "not found", "path": uri.path() })),
    )
}
