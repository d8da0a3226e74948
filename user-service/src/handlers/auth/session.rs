use axum_extra::extract::cookie::{Cookie, CookieJar};
use service_core::{
    axum::{extract::State, http::StatusCode, response::IntoResponse, Json},
    error::AppError,
};

use crate::{
    dtos::auth::{LoginRequest, LoginResponse, LogoutResponse},
    middleware::{AuthUser, SESSION_COOKIE},
    utils::ValidatedJson,
    AppState,
};

/// Login with email and password
#[utoipa::path(
    post,
    path = "/user/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = crate::dtos::ErrorResponse),
        (status = 404, description = "User not found", body = crate::dtos::ErrorResponse),
        (status = 429, description = "Too many requests", body = crate::dtos::ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.auth_service.login(&req.email, &req.password).await?;

    Ok((
        StatusCode::OK,
        Json(LoginResponse {
            user: session.user.sanitized(),
            token: session.token,
        }),
    ))
}

/// Log out. Sessions are stateless; the session cookie is cleared.
#[utoipa::path(
    get,
    path = "/user/logout",
    responses(
        (status = 200, description = "Logged out", body = LogoutResponse),
        (status = 401, description = "Unauthorized", body = crate::dtos::ErrorResponse)
    ),
    tag = "Authentication",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn logout(AuthUser(user): AuthUser, jar: CookieJar) -> impl IntoResponse {
    tracing::info!(user_id = %user.id, "User logged out");

    // Sent even when the request authenticated by header.
    let mut cleared = Cookie::build((SESSION_COOKIE, "")).path("/").build();
    cleared.make_removal();

    (
        jar.add(cleared),
        Json(LogoutResponse {
            message: "Logged out successfully".to_string(),
        }),
    )
}
