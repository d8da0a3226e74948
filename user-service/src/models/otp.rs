//! One-time registration codes (`otps` collection).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wrong guesses tolerated before the code is destroyed.
pub const MAX_OTP_ATTEMPTS: i32 = 5;

/// Pending registration code. Keyed by email, so an email has at most one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpRecord {
    #[serde(rename = "_id")]
    pub email: String,
    /// SHA-256 hex digest of the 6-digit code.
    pub code_hash: String,
    pub attempts: i32,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub expires_at: DateTime<Utc>,
}

impl OtpRecord {
    pub fn new(email: String, code_hash: String, now: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        Self {
            email,
            code_hash,
            attempts: 0,
            created_at: now,
            expires_at,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts >= MAX_OTP_ATTEMPTS
    }
}
