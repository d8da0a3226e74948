use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use service_core::{
    axum::{extract::State, http::StatusCode, response::IntoResponse, Json},
    error::AppError,
};

use crate::{
    dtos::auth::{GoogleLoginRequest, SessionResponse},
    middleware::SESSION_COOKIE,
    utils::ValidatedJson,
    AppState,
};

/// Sign in with a Google authorization code
///
/// Creates the account on first use. The session token is returned in the
/// body and also set as an HTTP-only `token` cookie.
#[utoipa::path(
    post,
    path = "/user/google-login",
    request_body = GoogleLoginRequest,
    responses(
        (status = 200, description = "Google login successful", body = SessionResponse),
        (status = 400, description = "Missing code or email", body = crate::dtos::ErrorResponse),
        (status = 401, description = "Authorization code rejected", body = crate::dtos::ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn google_login(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidatedJson(req): ValidatedJson<GoogleLoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.auth_service.federated_login(&req.code).await?;

    let max_age = state.auth_service.sessions().federated_session_ttl();
    let is_dev = state.config.is_dev();

    // Cross-site frontends need SameSite=None, which browsers only accept with Secure.
    let cookie = Cookie::build((SESSION_COOKIE, session.token.clone()))
        .path("/")
        .http_only(true)
        .secure(!is_dev)
        .same_site(if is_dev { SameSite::Lax } else { SameSite::None })
        .max_age(time::Duration::seconds(max_age.num_seconds()));

    Ok((
        StatusCode::OK,
        jar.add(cookie),
        Json(SessionResponse::new("Google login successful", session)),
    ))
}
