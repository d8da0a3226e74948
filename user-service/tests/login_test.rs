mod common;

use axum::{extract::ConnectInfo, http::StatusCode};
use common::TestApp;
use serde_json::json;
use std::net::SocketAddr;
use user_service::{config::UserServiceConfig, services::UserStore};

#[tokio::test]
async fn test_login_returns_session_and_user() {
    let app = TestApp::spawn().await;
    let registered = app.register("Ana", "ana@x.com", "secret1").await;

    let res = app.login("ana@x.com", "secret1").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["user"]["id"], registered.body["user"]["id"]);
    assert!(res.body["user"].get("password").is_none());

    let claims = app
        .state
        .auth_service
        .sessions()
        .verify(&res.token())
        .expect("login token should verify");
    assert_eq!(claims.sub, res.body["user"]["id"].as_str().unwrap());
    assert_eq!(claims.email, "ana@x.com");
    assert_eq!(claims.exp - claims.iat, 24 * 3600);
}

#[tokio::test]
async fn test_wrong_password() {
    let app = TestApp::spawn().await;
    app.register("Ana", "ana@x.com", "secret1").await;

    let res = app.login("ana@x.com", "secret2").await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.message(), "Invalid credentials");
    assert!(res.body.get("token").is_none());
}

#[tokio::test]
async fn test_unknown_email() {
    let app = TestApp::spawn().await;

    let res = app.login("nobody@x.com", "secret1").await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.message(), "User not found");
}

#[tokio::test]
async fn test_google_only_account_cannot_use_password() {
    let app = TestApp::spawn().await;
    app.accept_google_code("code-1", "g-100", "gina@x.com", "Gina");
    let res = app
        .post_json("/user/google-login", json!({ "code": "code-1" }))
        .await;
    assert_eq!(res.status, StatusCode::OK);

    let res = app.login("gina@x.com", "anything").await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.message(), "Invalid credentials");
}

#[tokio::test]
async fn test_deactivated_account_is_refused() {
    let app = TestApp::spawn().await;
    app.register("Ana", "ana@x.com", "secret1").await;

    let mut user = app.store.find_by_email("ana@x.com").await.unwrap().unwrap();
    user.is_active = false;
    app.store.save(&user).await.unwrap();

    let res = app.login("ana@x.com", "secret1").await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_missing_fields() {
    let app = TestApp::spawn().await;

    let res = app
        .post_json("/user/login", json!({ "email": "ana@x.com" }))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.message(), "Email and password are required");
}

async fn login_from(app: &TestApp, peer: &str, forwarded_for: Option<&str>) -> common::TestResponse {
    let mut builder = axum::http::Request::builder()
        .method("POST")
        .uri("/user/login")
        .header("content-type", "application/json");
    if let Some(forwarded_for) = forwarded_for {
        builder = builder.header("x-forwarded-for", forwarded_for);
    }
    let mut request = builder
        .body(axum::body::Body::from(
            json!({ "email": "ana@x.com", "password": "secret1" }).to_string(),
        ))
        .unwrap();
    let addr: SocketAddr = format!("{}:51000", peer).parse().unwrap();
    request.extensions_mut().insert(ConnectInfo(addr));

    app.request(request).await
}

fn limited_config(trust_forwarded_for: bool) -> UserServiceConfig {
    let mut config = common::test_config();
    config.rate_limit.login_attempts = 2;
    config.rate_limit.login_window_seconds = 3600;
    config.rate_limit.trust_forwarded_for = trust_forwarded_for;
    config
}

#[tokio::test]
async fn test_login_rate_limit() {
    let app = TestApp::spawn_with(limited_config(false)).await;

    assert_eq!(login_from(&app, "203.0.113.7", None).await.status, StatusCode::NOT_FOUND);
    assert_eq!(login_from(&app, "203.0.113.7", None).await.status, StatusCode::NOT_FOUND);

    let res = login_from(&app, "203.0.113.7", None).await;
    assert_eq!(res.status, StatusCode::TOO_MANY_REQUESTS);
    assert!(res.headers.contains_key("retry-after"));

    // Other clients keep their own budget.
    assert_eq!(login_from(&app, "203.0.113.8", None).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_rotating_forwarded_for_does_not_reset_budget() {
    let app = TestApp::spawn_with(limited_config(false)).await;

    let mut allowed = 0;
    for i in 0..20 {
        let spoofed = format!("10.0.{}.{}", i / 250, i % 250);
        let res = login_from(&app, "203.0.113.7", Some(&spoofed)).await;
        if res.status != StatusCode::TOO_MANY_REQUESTS {
            allowed += 1;
        }
    }
    assert_eq!(allowed, 2);
    assert_eq!(app.state.login_rate_limiter.tracked_keys(), 1);
}

#[tokio::test]
async fn test_trusted_proxy_limits_by_appended_hop() {
    let app = TestApp::spawn_with(limited_config(true)).await;
    let proxy = "10.1.0.1";

    for spoofed in ["6.6.6.1", "6.6.6.2"] {
        let res = login_from(&app, proxy, Some(&format!("{}, 198.51.100.4", spoofed))).await;
        assert_eq!(res.status, StatusCode::NOT_FOUND);
    }
    let res = login_from(&app, proxy, Some("6.6.6.3, 198.51.100.4")).await;
    assert_eq!(res.status, StatusCode::TOO_MANY_REQUESTS);

    // Another client behind the same proxy is unaffected.
    let res = login_from(&app, proxy, Some("198.51.100.5")).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}
