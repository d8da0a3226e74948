use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Password reset token (`password_reset_tokens` collection), one per email.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetTokenRecord {
    #[serde(rename = "_id")]
    pub email: String,
    pub token_hash: String,
    pub used: bool,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub expires_at: DateTime<Utc>,
}

impl ResetTokenRecord {
    pub fn new(email: String, token_hash: String, now: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        Self {
            email,
            token_hash,
            used: false,
            created_at: now,
            expires_at,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        !self.used && !self.is_expired(now)
    }
}
