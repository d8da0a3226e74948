use async_trait::async_trait;

use super::error::AuthError;
use crate::models::User;

/// Persistence for user accounts. Emails are passed in normalized form.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, AuthError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError>;

    /// First user matching either the email or the Google subject id.
    async fn find_by_email_or_google_id(
        &self,
        email: &str,
        google_id: &str,
    ) -> Result<Option<User>, AuthError>;

    /// Fails with `AlreadyExists` when the email or Google id is taken.
    async fn insert(&self, user: &User) -> Result<(), AuthError>;

    /// Overwrites the stored document with the same id.
    async fn save(&self, user: &User) -> Result<(), AuthError>;

    async fn ping(&self) -> Result<(), AuthError> {
        Ok(())
    }
}
