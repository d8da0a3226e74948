//! Short-lived OTP and password reset tokens.
//!
//! Only SHA-256 digests are persisted. Issuing replaces whatever the email
//! already had, and consuming is a single conditional write, so two racing
//! callers cannot both succeed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::{Rng, RngCore};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

use super::clock::Clock;
use super::error::AuthError;
use crate::models::{OtpRecord, ResetTokenRecord};

#[async_trait]
pub trait OtpStore: Send + Sync {
    /// Replaces any code already issued for `record.email`.
    async fn issue(&self, record: OtpRecord) -> Result<(), AuthError>;

    /// Deletes and accepts the code when it matches and is live.
    ///
    /// A wrong guess counts against the attempt budget; an expired or
    /// exhausted record is removed.
    async fn consume(
        &self,
        email: &str,
        code_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, AuthError>;

    async fn revoke(&self, email: &str) -> Result<(), AuthError>;

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, AuthError>;
}

#[async_trait]
pub trait ResetTokenStore: Send + Sync {
    /// Replaces any token already issued for `record.email`.
    async fn issue(&self, record: ResetTokenRecord) -> Result<(), AuthError>;

    /// Marks a live token used and returns its email.
    async fn consume(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, AuthError>;

    async fn revoke(&self, email: &str) -> Result<(), AuthError>;

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, AuthError>;
}

/// Uniform 6-digit code, zero padded.
pub fn generate_otp() -> String {
    format!("{:06}", rand::thread_rng().gen_range(0..1_000_000u32))
}

/// 256 random bits as 64 hex characters.
pub fn generate_reset_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn hash_secret(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}

/// Periodically deletes expired OTPs and reset tokens.
pub fn spawn_token_sweeper(
    otps: Arc<dyn OtpStore>,
    reset_tokens: Arc<dyn ResetTokenStore>,
    clock: Arc<dyn Clock>,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let now = clock.now();

            match otps.purge_expired(now).await {
                Ok(0) => {}
                Ok(count) => tracing::debug!(count, "Purged expired OTPs"),
                Err(e) => tracing::warn!(error = %e, "Failed to purge expired OTPs"),
            }

            match reset_tokens.purge_expired(now).await {
                Ok(0) => {}
                Ok(count) => tracing::debug!(count, "Purged expired reset tokens"),
                Err(e) => tracing::warn!(error = %e, "Failed to purge expired reset tokens"),
            }
        }
    })
}
