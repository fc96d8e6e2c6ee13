mod common;

use std::net::Ipv4Addr;
use std::sync::Arc;

use axum::http::{Method, StatusCode};
use bharatmart_backend::{build_router, cors_layer};
use bharatmart_db::backends::SqliteAdapter;
use bharatmart_db::DbConnectionConfig;
use bharatmart_job_queue::JobQueueClient;

use common::{router, send, state_with, test_state};

#[tokio::test]
async fn startup_with_config_binds_and_serves_health() {
    let cfg = bharatmart_config::Config::default();
    let router = build_router(test_state().await).layer(cors_layer(&cfg.cors));

    let listener = tokio::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local_addr");

    let handle = tokio::spawn(async move {
        axum::serve(listener, router.into_make_service())
            .await
            .unwrap();
    });

    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    let url = format!("http://{}:{}/api/health", addr.ip(), addr.port());
    let res = reqwest::get(&url).await.expect("request");
    assert!(res.status().is_success());
    let body: serde_json::Value = res.json().await.expect("json body");
    assert_eq!(body["ok"], true);
    assert_eq!(body["database"], "sqlite");

    handle.abort();
}

#[tokio::test]
async fn readiness_reports_each_dependency() {
    let app = router(test_state().await);

    let res = send(&app, Method::GET, "/api/health/ready", None, None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["status"], "ready");
    assert_eq!(res.body["checks"]["database"], "ok");
    assert_eq!(res.body["checks"]["databaseType"], "sqlite");
    assert_eq!(res.body["checks"]["queue"], "ok");
    assert_eq!(res.body["checks"]["service"], "ok");
}

#[tokio::test]
async fn readiness_fails_when_the_database_is_not_initialized() {
    let adapter = SqliteAdapter::new(DbConnectionConfig::new("sqlite::memory:"));
    let state = state_with(Arc::new(adapter), JobQueueClient::in_memory());
    let app = router(state);

    let res = send(&app, Method::GET, "/api/health/ready", None, None).await;
    assert_eq!(res.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(res.body["status"], "not ready");
    assert_eq!(res.body["checks"]["database"], "failed");

    // Liveness does not touch the database.
    let live = send(&app, Method::GET, "/api/health", None, None).await;
    assert_eq!(live.status, StatusCode::OK);
}

#[tokio::test]
async fn banner_and_unknown_routes() {
    let app = router(test_state().await);

    let banner = send(&app, Method::GET, "/", None, None).await;
    assert_eq!(banner.status, StatusCode::OK);
    assert_eq!(banner.body["name"], "BharatMart API");
    assert_eq!(banner.body["queue"], "memory");
    assert_eq!(banner.body["endpoints"]["products"], "/api/products");

    let missing = send(&app, Method::GET, "/api/nowhere", None, None).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.body["error"], "not found");
    assert_eq!(missing.body["path"], "/api/nowhere");
}

#[tokio::test]
async fn queue_stats_cover_every_queue() {
    let app = router(test_state().await);

    let res = send(&app, Method::GET, "/api/queues/stats", None, None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["broker"], "memory");
    for key in ["orders", "emails", "payments"] {
        assert_eq!(res.body[key]["waiting"], 0, "{key}");
        assert_eq!(res.body[key]["failed"], 0, "{key}");
    }
}
