mod common;

use axum::http::{Method, StatusCode};
use bharatmart_db::models::Role;
use serde_json::json;

use common::{product, router, send, test_state, user_with_token};

#[tokio::test]
async fn list_is_cached_until_an_admin_write() {
    let state = test_state().await;
    let app = router(state.clone());
    let (_, admin) = user_with_token(&state, "admin@example.in", Role::Admin).await;
    product(&state, "Phone", 299.0, 5).await;

    let first = send(&app, Method::GET, "/api/products", None, None).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.headers["x-cache"], "MISS");
    assert_eq!(first.body["count"], 1);

    let second = send(&app, Method::GET, "/api/products", None, None).await;
    assert_eq!(second.headers["x-cache"], "HIT");
    assert_eq!(second.body, first.body);

    let created = send(
        &app,
        Method::POST,
        "/api/products",
        Some(&admin),
        Some(json!({ "name": "Laptop", "price": 55000.0, "category": "electronics", "stock": 2 })),
    )
    .await;
    assert_eq!(created.status, StatusCode::CREATED);
    let id = created.body["product"]["id"].as_str().unwrap().to_owned();

    let after = send(&app, Method::GET, "/api/products", None, None).await;
    assert_eq!(after.headers["x-cache"], "MISS");
    assert_eq!(after.body["count"], 2);

    let updated = send(
        &app,
        Method::PUT,
        &format!("/api/products/{id}"),
        Some(&admin),
        Some(json!({ "stock": 7 })),
    )
    .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.body["product"]["stock"], 7);

    let fetched = send(&app, Method::GET, &format!("/api/products/{id}"), None, None).await;
    assert_eq!(fetched.body["product"]["stock"], 7);

    let deleted = send(
        &app,
        Method::DELETE,
        &format!("/api/products/{id}"),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(deleted.status, StatusCode::OK);
    let gone = send(&app, Method::GET, &format!("/api/products/{id}"), None, None).await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn filters_sorts_and_pages() {
    let state = test_state().await;
    let app = router(state.clone());
    for (name, price) in [("A", 30.0), ("B", 10.0), ("C", 20.0)] {
        product(&state, name, price, 1).await;
    }

    let res = send(
        &app,
        Method::GET,
        "/api/products?category=electronics&sort=price&order=asc&limit=2",
        None,
        None,
    )
    .await;
    assert_eq!(res.status, StatusCode::OK);
    let prices: Vec<f64> = res.body["products"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["price"].as_f64().unwrap())
        .collect();
    assert_eq!(prices, vec![10.0, 20.0]);

    let none = send(&app, Method::GET, "/api/products?category=books", None, None).await;
    assert_eq!(none.body["count"], 0);

    let bad_sort = send(&app, Method::GET, "/api/products?sort=password", None, None).await;
    assert_eq!(bad_sort.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn writes_require_admin() {
    let state = test_state().await;
    let app = router(state.clone());
    let (_, customer) = user_with_token(&state, "c@example.in", Role::Customer).await;
    let body = json!({ "name": "Kurta", "price": 999.0 });

    let anonymous = send(&app, Method::POST, "/api/products", None, Some(body.clone())).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let forbidden = send(&app, Method::POST, "/api/products", Some(&customer), Some(body)).await;
    assert_eq!(forbidden.status, StatusCode::FORBIDDEN);

    let (_, admin) = user_with_token(&state, "a@example.in", Role::Admin).await;
    let negative = send(
        &app,
        Method::POST,
        "/api/products",
        Some(&admin),
        Some(json!({ "name": "Kurta", "price": -1.0 })),
    )
    .await;
    assert_eq!(negative.status, StatusCode::BAD_REQUEST);
}
