mod common;

use axum::http::StatusCode;
use common::TestApp;
use serde_json::json;
use user_service::{
    config::Environment,
    services::{FederatedIdentity, GrantFailure, UserStore},
};

async fn google_login(app: &TestApp, code: &str) -> common::TestResponse {
    app.post_json("/user/google-login", json!({ "code": code }))
        .await
}

#[tokio::test]
async fn test_first_sign_in_creates_verified_user() {
    let app = TestApp::spawn().await;
    app.accept_google_code("code-1", "g-100", "gina@x.com", "Gina");

    let res = google_login(&app, "code-1").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["success"], true);
    assert_eq!(res.message(), "Google login successful");

    let user = &res.body["user"];
    assert_eq!(user["email"], "gina@x.com");
    assert_eq!(user["name"], "Gina");
    assert_eq!(user["authProvider"], "google");
    assert_eq!(user["isEmailVerified"], true);
    assert_eq!(
        user["profilePicture"],
        "https://lh3.googleusercontent.test/g-100"
    );

    let stored = app.store.find_by_email("gina@x.com").await.unwrap().unwrap();
    assert_eq!(stored.google_id.as_deref(), Some("g-100"));
    assert!(stored.password_hash.is_none());

    let claims = app
        .state
        .auth_service
        .sessions()
        .verify(&res.token())
        .unwrap();
    assert_eq!(claims.exp - claims.iat, 7 * 24 * 3600);
}

#[tokio::test]
async fn test_session_cookie_is_set() {
    let app = TestApp::spawn().await;
    app.accept_google_code("code-1", "g-100", "gina@x.com", "Gina");

    let res = google_login(&app, "code-1").await;
    let cookie = res
        .set_cookies()
        .into_iter()
        .find(|c| c.starts_with("token="))
        .expect("no session cookie");

    assert!(cookie.contains(&format!("token={}", res.token())));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Lax"));
    assert!(cookie.contains("Path=/"));
    assert!(cookie.contains("Max-Age=604800"));
    assert!(!cookie.contains("Secure"));
}

#[tokio::test]
async fn test_production_cookie_is_cross_site() {
    let mut config = common::test_config();
    config.environment = Environment::Prod;
    let app = TestApp::spawn_with(config).await;
    app.accept_google_code("code-1", "g-100", "gina@x.com", "Gina");

    let res = google_login(&app, "code-1").await;
    let cookie = res
        .set_cookies()
        .into_iter()
        .find(|c| c.starts_with("token="))
        .expect("no session cookie");

    assert!(cookie.contains("Secure"));
    assert!(cookie.contains("SameSite=None"));
}

#[tokio::test]
async fn test_repeat_sign_in_reuses_account() {
    let app = TestApp::spawn().await;
    app.accept_google_code("code-1", "g-100", "gina@x.com", "Gina");
    app.accept_google_code("code-2", "g-100", "gina@x.com", "Gina");

    let first = google_login(&app, "code-1").await;
    let second = google_login(&app, "code-2").await;

    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(first.body["user"]["id"], second.body["user"]["id"]);
    assert_eq!(app.store.user_count().await, 1);
}

#[tokio::test]
async fn test_links_existing_local_account() {
    let app = TestApp::spawn().await;
    let registered = app.register("Ana", "ana@x.com", "secret1").await;
    app.accept_google_code("code-1", "g-200", "ana@x.com", "Ana G");

    let res = google_login(&app, "code-1").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["user"]["id"], registered.body["user"]["id"]);
    assert_eq!(res.body["user"]["authProvider"], "local");
    assert_eq!(res.body["user"]["name"], "Ana");
    assert_eq!(app.store.user_count().await, 1);

    let stored = app.store.find_by_email("ana@x.com").await.unwrap().unwrap();
    assert_eq!(stored.google_id.as_deref(), Some("g-200"));

    // The password keeps working after linking.
    assert_eq!(app.login("ana@x.com", "secret1").await.status, StatusCode::OK);
}

#[tokio::test]
async fn test_missing_email_is_rejected() {
    let app = TestApp::spawn().await;
    app.identity.accept(
        "code-1",
        FederatedIdentity {
            subject: "g-300".to_string(),
            email: None,
            email_verified: false,
            name: Some("Nomail".to_string()),
            picture: None,
        },
    );
    app.identity.accept(
        "code-2",
        FederatedIdentity {
            subject: "g-301".to_string(),
            email: Some("unverified@x.com".to_string()),
            email_verified: false,
            name: None,
            picture: None,
        },
    );

    let res = google_login(&app, "code-1").await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.message(), "Unable to get email from Google");

    let res = google_login(&app, "code-2").await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(app.store.user_count().await, 0);
}

#[tokio::test]
async fn test_rejected_codes_report_reason() {
    let app = TestApp::spawn().await;
    app.identity.reject("mismatch", GrantFailure::RedirectMismatch);
    app.identity.reject("stale", GrantFailure::ExpiredCode);

    let res = google_login(&app, "mismatch").await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.message(), GrantFailure::RedirectMismatch.to_string());

    let res = google_login(&app, "stale").await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.message(), GrantFailure::ExpiredCode.to_string());

    let res = google_login(&app, "never-issued").await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.message(), "Invalid Google access token");

    assert!(res.set_cookies().is_empty());
    assert_eq!(app.store.user_count().await, 0);
}

#[tokio::test]
async fn test_code_is_required() {
    let app = TestApp::spawn().await;

    let res = app.post_json("/user/google-login", json!({})).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.message(), "Authorization code is required");
}

#[tokio::test]
async fn test_name_falls_back_to_email_local_part() {
    let app = TestApp::spawn().await;
    app.identity.accept(
        "code-1",
        FederatedIdentity {
            subject: "g-400".to_string(),
            email: Some("Quiet.User@X.com".to_string()),
            email_verified: true,
            name: None,
            picture: None,
        },
    );

    let res = google_login(&app, "code-1").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["user"]["email"], "quiet.user@x.com");
    assert_eq!(res.body["user"]["name"], "quiet.user");
    assert!(res.body["user"]["profilePicture"].is_null());
}
