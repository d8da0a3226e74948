mod common;

use axum::http::StatusCode;
use common::{MultipartForm, TestApp};
use serde_json::json;
use user_service::services::avatar::MAX_AVATAR_BYTES;

const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

#[tokio::test]
async fn test_get_profile() {
    let app = TestApp::spawn().await;
    let token = app.register_token("Ana", "ana@x.com", "secret1").await;

    let res = app.get_authed("/user/profile", &token).await;
    assert_eq!(res.status, StatusCode::OK);

    let user = &res.body["user"];
    assert_eq!(user["name"], "Ana");
    assert_eq!(user["email"], "ana@x.com");
    assert_eq!(user["isActive"], true);
    assert!(user["profilePicture"].is_null());
    assert!(user.get("password").is_none());
    assert!(user.get("passwordHash").is_none());
}

#[tokio::test]
async fn test_update_name() {
    let app = TestApp::spawn().await;
    let token = app.register_token("Ana", "ana@x.com", "secret1").await;

    let res = app
        .request(
            MultipartForm::new()
                .text("name", "Ana Maria")
                .into_request("/user/update-profile", &token),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["success"], true);
    assert_eq!(res.body["user"]["name"], "Ana Maria");

    // The reissued session carries the new name.
    let claims = app
        .state
        .auth_service
        .sessions()
        .verify(&res.token())
        .unwrap();
    assert_eq!(claims.name, "Ana Maria");

    let res = app.get_authed("/user/profile", &token).await;
    assert_eq!(res.body["user"]["name"], "Ana Maria");
    assert!(app.avatars.uploads().is_empty());
}

#[tokio::test]
async fn test_update_avatar() {
    let app = TestApp::spawn().await;
    let registered = app.register("Ana", "ana@x.com", "secret1").await;
    let token = registered.token();
    let user_id = registered.body["user"]["id"].as_str().unwrap().to_string();

    let res = app
        .request(
            MultipartForm::new()
                .file("avatar", "me.png", "image/png", PNG_HEADER)
                .into_request("/user/update-profile", &token),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(
        res.body["user"]["profilePicture"],
        format!("https://images.example.test/user_avatars/user_{}.png", user_id)
    );
    assert_eq!(res.body["user"]["name"], "Ana");

    let uploads = app.avatars.uploads();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].0, user_id);
    assert_eq!(uploads[0].1.file_name, "me.png");
    assert_eq!(uploads[0].1.bytes, PNG_HEADER);
}

#[tokio::test]
async fn test_empty_file_part_is_ignored() {
    let app = TestApp::spawn().await;
    let token = app.register_token("Ana", "ana@x.com", "secret1").await;

    let res = app
        .request(
            MultipartForm::new()
                .text("name", "Ana B")
                .file("avatar", "", "application/octet-stream", &[])
                .into_request("/user/update-profile", &token),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["user"]["name"], "Ana B");
    assert!(app.avatars.uploads().is_empty());
}

#[tokio::test]
async fn test_rejects_non_image_avatar() {
    let app = TestApp::spawn().await;
    let token = app.register_token("Ana", "ana@x.com", "secret1").await;

    let res = app
        .request(
            MultipartForm::new()
                .file("avatar", "notes.txt", "text/plain", b"hello")
                .into_request("/user/update-profile", &token),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.message(), "Avatar must be an image");
    assert!(app.avatars.uploads().is_empty());
}

#[tokio::test]
async fn test_rejects_oversized_avatar() {
    let app = TestApp::spawn().await;
    let token = app.register_token("Ana", "ana@x.com", "secret1").await;
    let big = vec![0u8; MAX_AVATAR_BYTES + 1];

    let res = app
        .request(
            MultipartForm::new()
                .file("avatar", "big.png", "image/png", &big)
                .into_request("/user/update-profile", &token),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert!(app.avatars.uploads().is_empty());
}

#[tokio::test]
async fn test_rejects_blank_name() {
    let app = TestApp::spawn().await;
    let token = app.register_token("Ana", "ana@x.com", "secret1").await;

    let res = app
        .request(
            MultipartForm::new()
                .text("name", "   ")
                .into_request("/user/update-profile", &token),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.message(), "Name cannot be empty");
}

#[tokio::test]
async fn test_update_profile_requires_session() {
    let app = TestApp::spawn().await;

    let res = app
        .request(
            MultipartForm::new()
                .text("name", "Mallory")
                .into_request("/user/update-profile", "bogus"),
        )
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_clears_cookie() {
    let app = TestApp::spawn().await;
    app.accept_google_code("code-1", "g-100", "gina@x.com", "Gina");
    let token = app
        .post_json("/user/google-login", json!({ "code": "code-1" }))
        .await
        .token();

    let res = app.get_authed("/user/logout", &token).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.message(), "Logged out successfully");

    let cookie = res
        .set_cookies()
        .into_iter()
        .find(|c| c.starts_with("token="))
        .expect("logout should clear the cookie");
    assert!(cookie.starts_with("token=;"));
    assert!(cookie.contains("Max-Age=0"));
}

#[tokio::test]
async fn test_logout_requires_session() {
    let app = TestApp::spawn().await;

    let res = app.get("/user/logout").await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}
