mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::http::{Method, StatusCode};
use bharatmart_db::models::Role;
use bharatmart_job_queue::{InMemoryBroker, JobQueueClient, JobStatus, QueueName};
use bharatmart_jobs::{register_all_executors, JobDependencies, LogMailer, SimulatedGateway};
use serde_json::json;

use common::{memory_db, product, router, send, state_with, test_state, user_with_token};

#[tokio::test]
async fn placing_an_order_queues_processing_and_workers_confirm_it() {
    let db = memory_db().await;
    let client = JobQueueClient::in_memory();
    register_all_executors(
        &client,
        JobDependencies {
            db: db.clone(),
            mailer: Arc::new(LogMailer::new(Duration::ZERO)),
            gateway: Arc::new(SimulatedGateway),
        },
    )
    .await
    .unwrap();
    let state = state_with(db, client.clone());
    let app = router(state.clone());
    let (_, token) = user_with_token(&state, "buyer@example.in", Role::Customer).await;
    let tea = product(&state, "Assam Tea", 50.0, 10).await;

    let placed = send(
        &app,
        Method::POST,
        "/api/orders",
        Some(&token),
        Some(json!({
            "items": [{ "productId": tea, "quantity": 2 }],
            "shippingAddress": "MG Road, Bengaluru"
        })),
    )
    .await;
    assert_eq!(placed.status, StatusCode::CREATED);
    assert_eq!(placed.body["order"]["total_amount"], 100.0);
    assert_eq!(placed.body["order"]["status"], "pending");
    assert_eq!(placed.body["processing"]["status"], "queued");
    assert_eq!(placed.body["processing"]["queue"], "order-processing");
    let order_id = placed.body["order"]["id"].as_str().unwrap().to_owned();

    let stats = send(&app, Method::GET, "/api/queues/stats", None, None).await;
    assert_eq!(stats.status, StatusCode::OK);
    assert_eq!(stats.body["orders"]["waiting"], 1);

    let job = client
        .process_next(QueueName::OrderProcessing)
        .await
        .unwrap()
        .expect("order job");
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.progress, 100);

    let order = send(&app, Method::GET, &format!("/api/orders/{order_id}"), Some(&token), None).await;
    assert_eq!(order.status, StatusCode::OK);
    assert_eq!(order.body["order"]["status"], "confirmed");

    // The confirmation email went to its own queue.
    let stats = send(&app, Method::GET, "/api/queues/stats", None, None).await;
    assert_eq!(stats.body["emails"]["waiting"], 1);
    assert_eq!(stats.body["orders"]["completed"], 1);

    let paid = send(
        &app,
        Method::POST,
        "/api/payments",
        Some(&token),
        Some(json!({ "orderId": order_id, "paymentMethod": "upi" })),
    )
    .await;
    assert_eq!(paid.status, StatusCode::CREATED);
    assert_eq!(paid.body["payment"]["status"], "pending");
    assert_eq!(paid.body["payment"]["amount"], 100.0);
    let payment_id = paid.body["payment"]["id"].as_str().unwrap().to_owned();

    let job = client
        .process_next(QueueName::PaymentProcessing)
        .await
        .unwrap()
        .expect("payment job");
    assert_eq!(job.status, JobStatus::Completed);

    let payment = send(
        &app,
        Method::GET,
        &format!("/api/payments/{payment_id}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(payment.body["payment"]["status"], "completed");
    assert!(payment.body["payment"]["transaction_id"].is_string());

    let order = send(&app, Method::GET, &format!("/api/orders/{order_id}"), Some(&token), None).await;
    assert_eq!(order.body["order"]["payment_status"], "completed");

    let again = send(
        &app,
        Method::POST,
        "/api/payments",
        Some(&token),
        Some(json!({ "orderId": order_id })),
    )
    .await;
    assert_eq!(again.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn customers_only_see_their_own_orders() {
    let state = test_state().await;
    let app = router(state.clone());
    let (_, alice) = user_with_token(&state, "alice@example.in", Role::Customer).await;
    let (_, bob) = user_with_token(&state, "bob@example.in", Role::Customer).await;
    let (_, admin) = user_with_token(&state, "admin@example.in", Role::Admin).await;
    let pen = product(&state, "Pen", 20.0, 10).await;

    let placed = send(
        &app,
        Method::POST,
        "/api/orders",
        Some(&alice),
        Some(json!({ "items": [{ "product_id": pen, "quantity": 1 }] })),
    )
    .await;
    let order_id = placed.body["order"]["id"].as_str().unwrap().to_owned();

    let peek = send(&app, Method::GET, &format!("/api/orders/{order_id}"), Some(&bob), None).await;
    assert_eq!(peek.status, StatusCode::FORBIDDEN);

    let bobs = send(&app, Method::GET, "/api/orders", Some(&bob), None).await;
    assert_eq!(bobs.body["count"], 0);

    let all = send(&app, Method::GET, "/api/orders", Some(&admin), None).await;
    assert_eq!(all.body["count"], 1);

    let pay_for_alice = send(
        &app,
        Method::POST,
        "/api/payments",
        Some(&bob),
        Some(json!({ "orderId": order_id })),
    )
    .await;
    assert_eq!(pay_for_alice.status, StatusCode::FORBIDDEN);

    let anonymous = send(&app, Method::GET, "/api/orders", None, None).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn order_validation_errors() {
    let state = test_state().await;
    let app = router(state.clone());
    let (_, token) = user_with_token(&state, "v@example.in", Role::Customer).await;
    let mug = product(&state, "Mug", 150.0, 1).await;

    let empty = send(&app, Method::POST, "/api/orders", Some(&token), Some(json!({ "items": [] }))).await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);

    let unknown = send(
        &app,
        Method::POST,
        "/api/orders",
        Some(&token),
        Some(json!({ "items": [{ "productId": "ghost", "quantity": 1 }] })),
    )
    .await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);

    let too_many = send(
        &app,
        Method::POST,
        "/api/orders",
        Some(&token),
        Some(json!({ "items": [{ "productId": mug, "quantity": 5 }] })),
    )
    .await;
    assert_eq!(too_many.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn queue_outage_degrades_instead_of_failing_the_order() {
    let broker = Arc::new(InMemoryBroker::new());
    let client = JobQueueClient::new(broker.clone());
    let state = state_with(memory_db().await, client);
    let app = router(state.clone());
    let (_, token) = user_with_token(&state, "o@example.in", Role::Customer).await;
    let lamp = product(&state, "Lamp", 800.0, 3).await;

    broker.set_available(false);
    let placed = send(
        &app,
        Method::POST,
        "/api/orders",
        Some(&token),
        Some(json!({ "items": [{ "productId": lamp, "quantity": 1 }] })),
    )
    .await;
    assert_eq!(placed.status, StatusCode::CREATED);
    assert_eq!(placed.body["processing"]["status"], "degraded");
    assert!(placed.body["processing"]["jobId"].is_null());

    let stats = send(&app, Method::GET, "/api/queues/stats", None, None).await;
    assert_eq!(stats.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(stats.body["error"], "service unavailable");

    broker.set_available(true);
    let stats = send(&app, Method::GET, "/api/queues/stats", None, None).await;
    assert_eq!(stats.status, StatusCode::OK);
    assert_eq!(stats.body["orders"]["waiting"], 0);
}
