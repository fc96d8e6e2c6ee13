#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use bharatmart_auth::{Argon2Hasher, JwtAuthenticator};
use bharatmart_backend::build_router;
use bharatmart_backend::state::AppState;
use bharatmart_cache::CacheService;
use bharatmart_db::backends::SqliteAdapter;
use bharatmart_db::models::Role;
use bharatmart_db::repo::products::{self, NewProduct};
use bharatmart_db::repo::users::{self, NewUser};
use bharatmart_db::{DatabaseAdapter, DbConnectionConfig};
use bharatmart_job_queue::JobQueueClient;
use bharatmart_jobs::QueueService;
use serde_json::Value;
use tower::ServiceExt;

pub const JWT_SECRET: &str = "integration-test-secret";

pub async fn memory_db() -> Arc<dyn DatabaseAdapter> {
    let adapter = SqliteAdapter::new(DbConnectionConfig::new("sqlite::memory:"));
    adapter.initialize().await.expect("initialize sqlite");
    Arc::new(adapter)
}

/// Cheap Argon2 parameters so tests do not spend seconds hashing.
pub fn fast_hasher() -> Argon2Hasher {
    Argon2Hasher::new().with_memory_cost(1024).with_time_cost(1)
}

pub fn state_with(db: Arc<dyn DatabaseAdapter>, client: JobQueueClient) -> Arc<AppState> {
    Arc::new(
        AppState::new(
            db,
            CacheService::memory(),
            QueueService::new(client),
            JwtAuthenticator::new_hs256(JWT_SECRET),
        )
        .with_hasher(fast_hasher()),
    )
}

pub async fn test_state() -> Arc<AppState> {
    state_with(memory_db().await, JobQueueClient::in_memory())
}

/// Insert a user directly and return `(id, access token)`.
pub async fn user_with_token(state: &AppState, email: &str, role: Role) -> (String, String) {
    let user = users::create(
        state.db.as_ref(),
        NewUser {
            email: email.into(),
            password_hash: state.hasher.hash("correct-horse").unwrap(),
            role,
            full_name: None,
            phone: None,
            address: None,
        },
    )
    .await
    .unwrap();
    let token = state.tokens.issue_access(&user.id, role.as_str()).unwrap();
    (user.id, token)
}

pub async fn product(state: &AppState, name: &str, price: f64, stock: i64) -> String {
    products::create(
        state.db.as_ref(),
        NewProduct {
            name: name.into(),
            description: None,
            price,
            category: Some("electronics".into()),
            stock,
            image_url: None,
        },
    )
    .await
    .unwrap()
    .id
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

pub async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> TestResponse {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(t) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {t}"));
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&json).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    TestResponse {
        status,
        headers,
        body,
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    build_router(state)
}
