use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::error::AuthError;
use crate::config::CloudinaryConfig;

pub const MAX_AVATAR_BYTES: usize = 5 * 1024 * 1024;
const AVATAR_FOLDER: &str = "user_avatars";

/// Image received from the `avatar` multipart field.
#[derive(Debug, Clone)]
pub struct AvatarUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl AvatarUpload {
    pub fn validate(&self) -> Result<(), AuthError> {
        if !self.content_type.starts_with("image/") {
            return Err(AuthError::ValidationError(
                "Avatar must be an image".to_string(),
            ));
        }
        if self.bytes.is_empty() || self.bytes.len() > MAX_AVATAR_BYTES {
            return Err(AuthError::ValidationError(
                "Avatar must be between 1 byte and 5 MB".to_string(),
            ));
        }
        Ok(())
    }
}

/// Hosts profile pictures and hands back a public URL.
#[async_trait]
pub trait AvatarStore: Send + Sync {
    async fn upload(&self, user_id: &str, upload: AvatarUpload) -> Result<String, AuthError>;
}

/// Unsigned uploads to Cloudinary through an upload preset.
pub struct CloudinaryAvatarStore {
    http: reqwest::Client,
    upload_url: String,
    upload_preset: String,
}

#[derive(Deserialize)]
struct UploadResponse {
    secure_url: String,
}

impl CloudinaryAvatarStore {
    pub fn new(config: &CloudinaryConfig) -> Result<Self, anyhow::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            upload_url: format!(
                "https://api.cloudinary.com/v1_1/{}/image/upload",
                config.cloud_name
            ),
            upload_preset: config.upload_preset.clone(),
        })
    }
}

#[async_trait]
impl AvatarStore for CloudinaryAvatarStore {
    async fn upload(&self, user_id: &str, upload: AvatarUpload) -> Result<String, AuthError> {
        let part = Part::bytes(upload.bytes)
            .file_name(upload.file_name)
            .mime_str(&upload.content_type)
            .map_err(|_| AuthError::ValidationError("Avatar must be an image".to_string()))?;

        let form = Form::new()
            .part("file", part)
            .text("upload_preset", self.upload_preset.clone())
            .text("folder", AVATAR_FOLDER)
            .text("public_id", format!("user_{}", user_id));

        let response = self
            .http
            .post(&self.upload_url)
            .multipart(form)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                tracing::error!(error = %e, user_id = %user_id, "Avatar upload failed");
                AuthError::UpstreamFailure("Failed to upload profile picture".to_string())
            })?;

        let body: UploadResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "Malformed avatar upload response");
            AuthError::UpstreamFailure("Failed to upload profile picture".to_string())
        })?;

        tracing::info!(user_id = %user_id, "Avatar uploaded");
        Ok(body.secure_url)
    }
}

/// Used when no image host is configured.
pub struct DisabledAvatarStore;

#[async_trait]
impl AvatarStore for DisabledAvatarStore {
    async fn upload(&self, _user_id: &str, _upload: AvatarUpload) -> Result<String, AuthError> {
        Err(AuthError::ValidationError(
            "Profile picture uploads are not enabled".to_string(),
        ))
    }
}

/// Returns a predictable URL and remembers what was uploaded.
#[derive(Clone, Default)]
pub struct MockAvatarStore {
    uploads: Arc<Mutex<Vec<(String, AvatarUpload)>>>,
}

impl MockAvatarStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uploads(&self) -> Vec<(String, AvatarUpload)> {
        self.uploads.lock().map(|u| u.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl AvatarStore for MockAvatarStore {
    async fn upload(&self, user_id: &str, upload: AvatarUpload) -> Result<String, AuthError> {
        if let Ok(mut uploads) = self.uploads.lock() {
            uploads.push((user_id.to_string(), upload));
        }
        Ok(format!(
            "https://images.example.test/{}/user_{}.png",
            AVATAR_FOLDER, user_id
        ))
    }
}
