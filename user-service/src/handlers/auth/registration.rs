use service_core::{
    axum::{extract::State, http::StatusCode, response::IntoResponse, Json},
    error::AppError,
};

use crate::{
    dtos::auth::{MessageResponse, RegisterResponse, SendOtpRequest, VerifyOtpRequest},
    utils::ValidatedJson,
    AppState,
};

/// Email a one-time code to start registration
#[utoipa::path(
    post,
    path = "/user/send-otp",
    request_body = SendOtpRequest,
    responses(
        (status = 200, description = "OTP sent", body = MessageResponse),
        (status = 400, description = "Validation error", body = crate::dtos::ErrorResponse),
        (status = 409, description = "User already exists", body = crate::dtos::ErrorResponse),
        (status = 429, description = "Too many requests", body = crate::dtos::ErrorResponse),
        (status = 502, description = "Email could not be sent", body = crate::dtos::ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn send_otp(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<SendOtpRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .auth_service
        .request_registration(&req.name, &req.email, &req.password)
        .await?;

    Ok((
        StatusCode::OK,
        Json(MessageResponse::ok("OTP sent to your email")),
    ))
}

/// Verify the emailed code and create the account
#[utoipa::path(
    post,
    path = "/user/verify-otp-register",
    request_body = VerifyOtpRequest,
    responses(
        (status = 201, description = "Account created", body = RegisterResponse),
        (status = 400, description = "Invalid or expired OTP", body = crate::dtos::ErrorResponse),
        (status = 409, description = "User already exists", body = crate::dtos::ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn verify_otp_register(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<VerifyOtpRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = state
        .auth_service
        .confirm_registration(&req.name, &req.email, &req.password, &req.otp)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user: session.user.sanitized(),
            token: session.token,
            message: "Registration successful".to_string(),
        }),
    ))
}
