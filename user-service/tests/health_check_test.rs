mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use common::{TestApp, FRONTEND_URL};

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::spawn().await;

    let res = app.get("/health").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["status"], "healthy");
    assert_eq!(res.body["service"], "user-service");
    assert_eq!(res.body["version"], "1.0.0");
    assert_eq!(res.body["checks"]["database"], "up");
}

#[tokio::test]
async fn test_common_response_headers() {
    let app = TestApp::spawn().await;

    let res = app.get("/health").await;
    assert!(res.headers.contains_key("x-request-id"));
    assert_eq!(res.headers["x-content-type-options"], "nosniff");
}

#[tokio::test]
async fn test_openapi_document_lists_routes() {
    let app = TestApp::spawn().await;

    let res = app.get("/.well-known/openapi.json").await;
    assert_eq!(res.status, StatusCode::OK);

    let paths = res.body["paths"].as_object().expect("paths object");
    for path in [
        "/user/send-otp",
        "/user/verify-otp-register",
        "/user/login",
        "/user/logout",
        "/user/forgot-password",
        "/user/reset-password",
        "/user/change-password",
        "/user/profile",
        "/user/update-profile",
        "/user/google-login",
        "/health",
    ] {
        assert!(paths.contains_key(path), "missing {}", path);
    }
    assert!(res.body["components"]["securitySchemes"]["bearer_auth"].is_object());
}

#[tokio::test]
async fn test_openapi_served_with_swagger_enabled() {
    let mut config = common::test_config();
    config.swagger_enabled = true;
    let app = TestApp::spawn_with(config).await;

    let res = app.get("/.well-known/openapi.json").await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.body["paths"]["/user/login"].is_object());
}

#[tokio::test]
async fn test_cors_allows_configured_origin_with_credentials() {
    let app = TestApp::spawn().await;

    let res = app
        .request(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/user/login")
                .header(header::ORIGIN, FRONTEND_URL)
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(res.headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], FRONTEND_URL);
    assert_eq!(res.headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
}

#[tokio::test]
async fn test_cors_ignores_unknown_origin() {
    let app = TestApp::spawn().await;

    let res = app
        .request(
            Request::builder()
                .method(Method::GET)
                .uri("/health")
                .header(header::ORIGIN, "https://evil.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(res.status, StatusCode::OK);
    assert!(!res.headers.contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
}
