mod common;

use axum::http::{Method, StatusCode};
use bharatmart_db::SelectOptions;
use serde_json::json;

use common::{router, send, test_state};

#[tokio::test]
async fn signup_login_me_refresh_flow() {
    let state = test_state().await;
    let app = router(state.clone());

    let res = send(
        &app,
        Method::POST,
        "/api/auth/signup",
        None,
        Some(json!({
            "email": "asha@example.in",
            "password": "correct-horse",
            "full_name": "Asha Rao",
            "phone": "+91 98765 43210"
        })),
    )
    .await;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.body["user"]["email"], "asha@example.in");
    assert_eq!(res.body["user"]["role"], "customer");
    assert!(res.body["user"].get("password").is_none());
    assert!(res.body["token"].is_string());
    assert!(res.body["refreshToken"].is_string());

    let login = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "Asha@Example.in", "password": "correct-horse" })),
    )
    .await;
    assert_eq!(login.status, StatusCode::OK);
    let token = login.body["token"].as_str().unwrap().to_owned();
    let refresh_token = login.body["refreshToken"].as_str().unwrap().to_owned();

    let me = send(&app, Method::GET, "/api/auth/me", Some(&token), None).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["user"]["full_name"], "Asha Rao");

    let refreshed = send(
        &app,
        Method::POST,
        "/api/auth/refresh",
        None,
        Some(json!({ "refreshToken": refresh_token })),
    )
    .await;
    assert_eq!(refreshed.status, StatusCode::OK);
    assert!(refreshed.body["token"].is_string());

    // An access token is not a refresh token.
    let wrong = send(
        &app,
        Method::POST,
        "/api/auth/refresh",
        None,
        Some(json!({ "refreshToken": token })),
    )
    .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);

    let logout = send(&app, Method::POST, "/api/auth/logout", Some(&token), None).await;
    assert_eq!(logout.status, StatusCode::OK);
    assert_eq!(logout.body["message"], "Logged out successfully");
}

#[tokio::test]
async fn duplicate_signup_is_a_conflict_without_a_second_row() {
    let state = test_state().await;
    let app = router(state.clone());
    let body = json!({ "email": "ravi@example.in", "password": "long-enough-pw" });

    let first = send(&app, Method::POST, "/api/auth/signup", None, Some(body.clone())).await;
    assert_eq!(first.status, StatusCode::CREATED);
    let second = send(&app, Method::POST, "/api/auth/signup", None, Some(body)).await;
    assert_eq!(second.status, StatusCode::CONFLICT);
    assert_eq!(second.body["error"], "user already exists");

    let rows = state
        .db
        .select("users", &SelectOptions::new().filter("email", "ravi@example.in"))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn unknown_email_and_wrong_password_look_the_same() {
    let state = test_state().await;
    let app = router(state.clone());
    send(
        &app,
        Method::POST,
        "/api/auth/signup",
        None,
        Some(json!({ "email": "meera@example.in", "password": "correct-horse" })),
    )
    .await;

    let wrong_password = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "meera@example.in", "password": "battery-staple" })),
    )
    .await;
    let unknown_email = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "nobody@example.in", "password": "battery-staple" })),
    )
    .await;

    assert_eq!(wrong_password.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password.status, unknown_email.status);
    assert_eq!(wrong_password.body, unknown_email.body);
    assert_eq!(wrong_password.body["error"], "invalid credentials");
}

#[tokio::test]
async fn signup_validation_and_missing_auth() {
    let state = test_state().await;
    let app = router(state);

    let bad = send(
        &app,
        Method::POST,
        "/api/auth/signup",
        None,
        Some(json!({ "email": "not-an-email", "password": "short" })),
    )
    .await;
    assert_eq!(bad.status, StatusCode::BAD_REQUEST);
    assert_eq!(bad.body["validation"]["email"]["code"], "format");
    assert_eq!(bad.body["validation"]["password"]["code"], "too_short");

    let missing = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "a@example.in" })),
    )
    .await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);

    let anonymous = send(&app, Method::GET, "/api/auth/me", None, None).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let garbage = send(&app, Method::GET, "/api/auth/me", Some("not.a.jwt"), None).await;
    assert_eq!(garbage.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn authenticator_can_be_swapped_at_runtime() {
    use std::sync::Arc;

    use bharatmart_auth::{AuthenticatorTrait, JwtAuthenticator, TestAuthenticator};
    use bharatmart_db::models::Role;
    use common::user_with_token;

    let state = test_state().await;
    let app = router(state.clone());
    let (admin_id, token) = user_with_token(&state, "ops@example.in", Role::Admin).await;

    let me = send(&app, Method::GET, "/api/auth/me", Some(&token), None).await;
    assert_eq!(me.status, StatusCode::OK);

    // Rotating the signing key invalidates tokens issued under the old one.
    let rotated: Arc<dyn AuthenticatorTrait> = Arc::new(JwtAuthenticator::new_hs256("rotated-secret"));
    state.swap_authenticator(rotated);
    let stale = send(&app, Method::GET, "/api/auth/me", Some(&token), None).await;
    assert_eq!(stale.status, StatusCode::UNAUTHORIZED);

    state.swap_authenticator(Arc::new(TestAuthenticator::admin(admin_id)));
    let created = send(
        &app,
        Method::POST,
        "/api/products",
        Some("anything"),
        Some(json!({ "name": "Chai", "price": 120.0 })),
    )
    .await;
    assert_eq!(created.status, StatusCode::CREATED);
}
