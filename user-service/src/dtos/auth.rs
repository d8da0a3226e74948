use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::models::UserResponse;
use crate::services::AuthSession;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SendOtpRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "All fields are required"))]
    #[schema(example = "Ana")]
    pub name: String,

    #[serde(default)]
    #[validate(length(min = 1, message = "All fields are required"))]
    #[schema(example = "ana@x.com")]
    pub email: String,

    #[serde(default)]
    #[validate(length(min = 6, message = "Password must be at least 6 characters long"))]
    #[schema(example = "secret1", min_length = 6)]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct VerifyOtpRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "All fields are required"))]
    #[schema(example = "Ana")]
    pub name: String,

    #[serde(default)]
    #[validate(length(min = 1, message = "All fields are required"))]
    #[schema(example = "ana@x.com")]
    pub email: String,

    #[serde(default)]
    #[validate(length(min = 6, message = "Password must be at least 6 characters long"))]
    #[schema(example = "secret1", min_length = 6)]
    pub password: String,

    #[serde(default)]
    #[validate(length(min = 1, message = "OTP is required"))]
    #[schema(example = "042137")]
    pub otp: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Email and password are required"))]
    #[schema(example = "ana@x.com")]
    pub email: String,

    #[serde(default)]
    #[validate(length(min = 1, message = "Email and password are required"))]
    #[schema(example = "secret1")]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ForgotPasswordRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Email is required"))]
    #[schema(example = "ana@x.com")]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[serde(default)]
    #[schema(example = "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08")]
    pub token: String,

    #[serde(default)]
    #[validate(length(min = 6, message = "Password must be at least 6 characters long"))]
    #[schema(example = "newsecret", min_length = 6)]
    pub new_password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[serde(default)]
    #[schema(example = "secret1")]
    pub current_password: String,

    #[serde(default)]
    #[schema(example = "secret2", min_length = 6)]
    pub new_password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct GoogleLoginRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Authorization code is required"))]
    #[schema(example = "4/0AX4XfWh...")]
    pub code: String,
}

/// Multipart fields accepted by `PUT /user/update-profile` (documentation only).
#[derive(Debug, ToSchema)]
pub struct UpdateProfileForm {
    #[schema(example = "Ana Maria")]
    pub name: Option<String>,
    #[schema(value_type = Option<String>, format = Binary)]
    pub avatar: Option<Vec<u8>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    #[schema(example = true)]
    pub success: bool,
    #[schema(example = "OTP sent to your email")]
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: &str) -> Self {
        Self {
            success: true,
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LogoutResponse {
    #[schema(example = "Logged out successfully")]
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserResponse,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RegisterResponse {
    pub token: String,
    pub user: UserResponse,
    #[schema(example = "Registration successful")]
    pub message: String,
}

/// Returned by reset-password, change-password and google-login.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SessionResponse {
    pub success: bool,
    pub message: String,
    pub token: String,
    pub user: UserResponse,
}

impl SessionResponse {
    pub fn new(message: &str, session: AuthSession) -> Self {
        Self {
            success: true,
            message: message.to_string(),
            user: session.user.sanitized(),
            token: session.token,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProfileResponse {
    pub user: UserResponse,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateProfileResponse {
    pub success: bool,
    pub user: UserResponse,
    pub token: String,
}
