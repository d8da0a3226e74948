//! User account model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// How the account was first created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AuthProvider {
    Local,
    Google,
}

/// Persisted user document (`users` collection).
///
/// Every user carries a password hash, a Google subject id, or both.
/// The constructors are the only way to build one from scratch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    // Omitted when absent so the sparse unique index ignores the document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub is_email_verified: bool,
    pub is_active: bool,
    pub auth_provider: AuthProvider,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// A locally registered user whose email was proven through an OTP.
    pub fn new_local(name: String, email: String, password_hash: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email,
            password_hash: Some(password_hash),
            google_id: None,
            name,
            avatar_url: None,
            is_email_verified: true,
            is_active: true,
            auth_provider: AuthProvider::Local,
            created_at: now,
            updated_at: now,
        }
    }

    /// A user created on first Google sign-in.
    pub fn new_federated(
        name: String,
        email: String,
        google_id: String,
        avatar_url: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email,
            password_hash: None,
            google_id: Some(google_id),
            name,
            avatar_url,
            is_email_verified: true,
            is_active: true,
            auth_provider: AuthProvider::Google,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn sanitized(&self) -> UserResponse {
        UserResponse::from(self)
    }
}

/// API view of a user. Never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub profile_picture: Option<String>,
    pub auth_provider: AuthProvider,
    pub is_email_verified: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserResponse {
    fn from(u: &User) -> Self {
        Self {
            id: u.id.clone(),
            name: u.name.clone(),
            email: u.email.clone(),
            profile_picture: u.avatar_url.clone(),
            auth_provider: u.auth_provider,
            is_email_verified: u.is_email_verified,
            is_active: u.is_active,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}
