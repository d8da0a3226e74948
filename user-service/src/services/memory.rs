//! In-process store used by the test suite and for running without MongoDB.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tokio::sync::Mutex;

use super::error::AuthError;
use super::resources::{ResourceKind, ResourceOwners};
use super::tokens::{OtpStore, ResetTokenStore};
use super::users::UserStore;
use crate::models::{OtpRecord, ResetTokenRecord, User};

#[derive(Default)]
struct Inner {
    users: Vec<User>,
    otps: HashMap<String, OtpRecord>,
    reset_tokens: HashMap<String, ResetTokenRecord>,
    resources: HashMap<(ResourceKind, String), String>,
}

/// All collections behind one lock so every operation is atomic.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a transaction or goal owned by `owner_id`.
    pub async fn insert_resource(&self, kind: ResourceKind, id: &str, owner_id: &str) {
        self.inner
            .lock()
            .await
            .resources
            .insert((kind, id.to_string()), owner_id.to_string());
    }

    pub async fn user_count(&self) -> usize {
        self.inner.lock().await.users.len()
    }

    pub async fn otp_for(&self, email: &str) -> Option<OtpRecord> {
        self.inner.lock().await.otps.get(email).cloned()
    }

    pub async fn reset_token_for(&self, email: &str) -> Option<ResetTokenRecord> {
        self.inner.lock().await.reset_tokens.get(email).cloned()
    }
}

fn digest_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, AuthError> {
        let inner = self.inner.lock().await;
        Ok(inner.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let inner = self.inner.lock().await;
        Ok(inner.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_email_or_google_id(
        &self,
        email: &str,
        google_id: &str,
    ) -> Result<Option<User>, AuthError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .users
            .iter()
            .find(|u| u.email == email || u.google_id.as_deref() == Some(google_id))
            .cloned())
    }

    async fn insert(&self, user: &User) -> Result<(), AuthError> {
        let mut inner = self.inner.lock().await;
        let taken = inner.users.iter().any(|u| {
            u.id == user.id
                || u.email == user.email
                || (user.google_id.is_some() && u.google_id == user.google_id)
        });
        if taken {
            return Err(AuthError::AlreadyExists);
        }
        inner.users.push(user.clone());
        Ok(())
    }

    async fn save(&self, user: &User) -> Result<(), AuthError> {
        let mut inner = self.inner.lock().await;
        let conflict = inner.users.iter().any(|u| {
            u.id != user.id
                && (u.email == user.email
                    || (user.google_id.is_some() && u.google_id == user.google_id))
        });
        if conflict {
            return Err(AuthError::AlreadyExists);
        }
        match inner.users.iter_mut().find(|u| u.id == user.id) {
            Some(existing) => {
                *existing = user.clone();
                Ok(())
            }
            None => Err(AuthError::NotFound),
        }
    }
}

#[async_trait]
impl OtpStore for InMemoryStore {
    async fn issue(&self, record: OtpRecord) -> Result<(), AuthError> {
        let mut inner = self.inner.lock().await;
        inner.otps.insert(record.email.clone(), record);
        Ok(())
    }

    async fn consume(
        &self,
        email: &str,
        code_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, AuthError> {
        let mut inner = self.inner.lock().await;
        let Some(record) = inner.otps.get_mut(email) else {
            return Ok(false);
        };

        if record.is_expired(now) || record.is_exhausted() {
            inner.otps.remove(email);
            return Ok(false);
        }

        if digest_eq(&record.code_hash, code_hash) {
            inner.otps.remove(email);
            return Ok(true);
        }

        record.attempts += 1;
        if record.is_exhausted() {
            inner.otps.remove(email);
        }
        Ok(false)
    }

    async fn revoke(&self, email: &str) -> Result<(), AuthError> {
        self.inner.lock().await.otps.remove(email);
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, AuthError> {
        let mut inner = self.inner.lock().await;
        let before = inner.otps.len();
        inner.otps.retain(|_, r| !r.is_expired(now));
        Ok((before - inner.otps.len()) as u64)
    }
}

#[async_trait]
impl ResetTokenStore for InMemoryStore {
    async fn issue(&self, record: ResetTokenRecord) -> Result<(), AuthError> {
        let mut inner = self.inner.lock().await;
        inner.reset_tokens.insert(record.email.clone(), record);
        Ok(())
    }

    async fn consume(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, AuthError> {
        let mut inner = self.inner.lock().await;
        let Some(email) = inner
            .reset_tokens
            .values()
            .find(|r| digest_eq(&r.token_hash, token_hash))
            .map(|r| r.email.clone())
        else {
            return Ok(None);
        };

        let Some(record) = inner.reset_tokens.get_mut(&email) else {
            return Ok(None);
        };

        if record.is_expired(now) {
            inner.reset_tokens.remove(&email);
            return Ok(None);
        }
        if !record.is_live(now) {
            return Ok(None);
        }

        record.used = true;
        Ok(Some(email))
    }

    async fn revoke(&self, email: &str) -> Result<(), AuthError> {
        self.inner.lock().await.reset_tokens.remove(email);
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, AuthError> {
        let mut inner = self.inner.lock().await;
        let before = inner.reset_tokens.len();
        inner.reset_tokens.retain(|_, r| !r.is_expired(now));
        Ok((before - inner.reset_tokens.len()) as u64)
    }
}

#[async_trait]
impl ResourceOwners for InMemoryStore {
    async fn owner_of(&self, kind: ResourceKind, id: &str) -> Result<Option<String>, AuthError> {
        let inner = self.inner.lock().await;
        Ok(inner.resources.get(&(kind, id.to_string())).cloned())
    }
}
