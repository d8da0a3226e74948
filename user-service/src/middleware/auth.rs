use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;
use service_core::error::AppError;

use crate::{models::User, AppState};

/// Cookie carrying the session token after Google sign-in.
pub const SESSION_COOKIE: &str = "token";

/// The user resolved from the session token, stored in request extensions.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// Session token from the `token` cookie, else from `Authorization: Bearer`.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_string());
        }
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

pub(crate) fn unauthorized() -> AppError {
    AppError::Unauthorized(anyhow::anyhow!("Unauthorized"))
}

/// Resolves the acting user or fails with a uniform 401.
pub(crate) async fn authenticate_request(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<User, AppError> {
    let token = session_token(headers).ok_or_else(unauthorized)?;

    match state.auth_service.authenticate(&token).await {
        Ok(user) => Ok(user),
        Err(crate::services::AuthError::Unauthorized) => {
            tracing::debug!("Rejected session token");
            Err(unauthorized())
        }
        Err(e) => Err(e.into()),
    }
}

/// Middleware to require authentication
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = authenticate_request(&state, req.headers()).await?;

    req.extensions_mut().insert(CurrentUser(user));

    Ok(next.run(req).await)
}

/// Extractor to easily get the current user in handlers
pub struct AuthUser(pub User);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .map(|CurrentUser(user)| AuthUser(user.clone()))
            .ok_or_else(unauthorized)
    }
}
