use service_core::{
    axum::{extract::State, http::StatusCode, response::IntoResponse, Json},
    error::AppError,
};

use crate::{
    dtos::auth::{ForgotPasswordRequest, MessageResponse, ResetPasswordRequest, SessionResponse},
    utils::ValidatedJson,
    AppState,
};

/// Same answer whether or not the email has an account.
pub const RESET_REQUESTED_MESSAGE: &str =
    "If an account with that email exists, a password reset link has been sent.";

/// Request a password reset link
#[utoipa::path(
    post,
    path = "/user/forgot-password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Request received", body = MessageResponse),
        (status = 400, description = "Validation error", body = crate::dtos::ErrorResponse),
        (status = 429, description = "Too many requests", body = crate::dtos::ErrorResponse),
        (status = 502, description = "Email could not be sent", body = crate::dtos::ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn forgot_password(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ForgotPasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .auth_service
        .request_password_reset(&req.email)
        .await?;

    Ok((
        StatusCode::OK,
        Json(MessageResponse::ok(RESET_REQUESTED_MESSAGE)),
    ))
}

/// Set a new password with a reset token
#[utoipa::path(
    post,
    path = "/user/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset", body = SessionResponse),
        (status = 400, description = "Invalid or expired token", body = crate::dtos::ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn reset_password(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ResetPasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = state
        .auth_service
        .reset_password(&req.token, &req.new_password)
        .await?;

    Ok((
        StatusCode::OK,
        Json(SessionResponse::new("Password reset successful", session)),
    ))
}
