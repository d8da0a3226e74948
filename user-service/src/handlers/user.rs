use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;

use crate::{
    dtos::auth::{ChangePasswordRequest, ProfileResponse, SessionResponse, UpdateProfileResponse},
    middleware::AuthUser,
    services::AvatarUpload,
    utils::ValidatedJson,
    AppState,
};

/// Current user's profile
#[utoipa::path(
    get,
    path = "/user/profile",
    responses(
        (status = 200, description = "Profile", body = ProfileResponse),
        (status = 401, description = "Unauthorized", body = crate::dtos::ErrorResponse)
    ),
    tag = "User",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_profile(AuthUser(user): AuthUser) -> impl IntoResponse {
    Json(ProfileResponse {
        user: user.sanitized(),
    })
}

/// Update name and/or profile picture
#[utoipa::path(
    put,
    path = "/user/update-profile",
    request_body(content = crate::dtos::auth::UpdateProfileForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Profile updated", body = UpdateProfileResponse),
        (status = 400, description = "Validation error", body = crate::dtos::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::dtos::ErrorResponse),
        (status = 502, description = "Image upload failed", body = crate::dtos::ErrorResponse)
    ),
    tag = "User",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut name = None;
    let mut avatar = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!(e.body_text())))?
    {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("name") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(anyhow::anyhow!(e.body_text())))?;
                name = Some(text);
            }
            Some("avatar") => {
                let file_name = field.file_name().unwrap_or("avatar").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(anyhow::anyhow!(e.body_text())))?;

                // Browsers send an empty part when no file was picked.
                if !bytes.is_empty() {
                    avatar = Some(AvatarUpload {
                        file_name,
                        content_type,
                        bytes: bytes.to_vec(),
                    });
                }
            }
            _ => {}
        }
    }

    let session = state
        .auth_service
        .update_profile(&user, name, avatar)
        .await?;

    Ok((
        StatusCode::OK,
        Json(UpdateProfileResponse {
            success: true,
            user: session.user.sanitized(),
            token: session.token,
        }),
    ))
}

/// Change password (requires the current one)
#[utoipa::path(
    post,
    path = "/user/change-password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = SessionResponse),
        (status = 400, description = "Validation error", body = crate::dtos::ErrorResponse),
        (status = 401, description = "Current password is incorrect", body = crate::dtos::ErrorResponse)
    ),
    tag = "User",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidatedJson(req): ValidatedJson<ChangePasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = state
        .auth_service
        .change_password(&user, &req.current_password, &req.new_password)
        .await?;

    Ok((
        StatusCode::OK,
        Json(SessionResponse::new("Password changed successfully", session)),
    ))
}
