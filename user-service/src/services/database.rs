use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::{
    bson::{doc, oid::ObjectId, Bson, DateTime as BsonDateTime, Document},
    error::{ErrorKind, WriteFailure},
    options::{
        FindOneAndUpdateOptions, FindOneOptions, IndexOptions, ReplaceOptions, ReturnDocument,
    },
    Client as MongoClient, Collection, Database, IndexModel,
};
use service_core::error::AppError;
use std::time::Duration;

use super::error::AuthError;
use super::resources::{ResourceKind, ResourceOwners, OWNER_FIELD};
use super::tokens::{OtpStore, ResetTokenStore};
use super::users::UserStore;
use crate::models::{OtpRecord, ResetTokenRecord, User, MAX_OTP_ATTEMPTS};

const DUPLICATE_KEY: i32 = 11000;

#[derive(Clone)]
pub struct MongoDb {
    db: Database,
}

impl MongoDb {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, AppError> {
        tracing::info!("Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to connect to MongoDB: {}", e);
            AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
        })?;
        let db = client.database(database);
        tracing::info!(database = %database, "Successfully connected to MongoDB database");
        Ok(Self { db })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn users(&self) -> Collection<User> {
        self.db.collection("users")
    }

    pub fn otps(&self) -> Collection<OtpRecord> {
        self.db.collection("otps")
    }

    pub fn reset_tokens(&self) -> Collection<ResetTokenRecord> {
        self.db.collection("password_reset_tokens")
    }

    pub async fn initialize_indexes(&self) -> Result<(), AppError> {
        tracing::info!("Creating MongoDB indexes for user-service");

        let email_index = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(
                IndexOptions::builder()
                    .name("email_unique_idx".to_string())
                    .unique(true)
                    .build(),
            )
            .build();

        self.users()
            .create_index(email_index, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create email index: {}", e);
                AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
            })?;

        // Sparse: local accounts have no google_id field at all.
        let google_id_index = IndexModel::builder()
            .keys(doc! { "google_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("google_id_unique_idx".to_string())
                    .unique(true)
                    .sparse(true)
                    .build(),
            )
            .build();

        self.users()
            .create_index(google_id_index, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create google_id index: {}", e);
                AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
            })?;

        self.otps()
            .create_index(ttl_index("otp_expiry_ttl_idx"), None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create OTP TTL index: {}", e);
                AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
            })?;

        let token_hash_index = IndexModel::builder()
            .keys(doc! { "token_hash": 1 })
            .options(
                IndexOptions::builder()
                    .name("token_hash_unique_idx".to_string())
                    .unique(true)
                    .build(),
            )
            .build();

        self.reset_tokens()
            .create_index(token_hash_index, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create token_hash index: {}", e);
                AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
            })?;

        self.reset_tokens()
            .create_index(ttl_index("reset_token_expiry_ttl_idx"), None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create reset token TTL index: {}", e);
                AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
            })?;

        tracing::info!("MongoDB indexes created successfully");
        Ok(())
    }
}

fn ttl_index(name: &str) -> IndexModel {
    IndexModel::builder()
        .keys(doc! { "expires_at": 1 })
        .options(
            IndexOptions::builder()
                .name(name.to_string())
                .expire_after(Duration::from_secs(0))
                .build(),
        )
        .build()
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(e)) if e.code == DUPLICATE_KEY
    )
}

fn bson_time(at: DateTime<Utc>) -> BsonDateTime {
    BsonDateTime::from_chrono(at)
}

#[async_trait]
impl UserStore for MongoDb {
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, AuthError> {
        Ok(self.users().find_one(doc! { "_id": id }, None).await?)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        Ok(self.users().find_one(doc! { "email": email }, None).await?)
    }

    async fn find_by_email_or_google_id(
        &self,
        email: &str,
        google_id: &str,
    ) -> Result<Option<User>, AuthError> {
        let filter = doc! {
            "$or": [
                { "email": email },
                { "google_id": google_id },
            ]
        };
        let options = FindOneOptions::builder()
            .sort(doc! { "created_at": 1 })
            .build();
        Ok(self.users().find_one(filter, options).await?)
    }

    async fn insert(&self, user: &User) -> Result<(), AuthError> {
        match self.users().insert_one(user, None).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => Err(AuthError::AlreadyExists),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, user: &User) -> Result<(), AuthError> {
        match self
            .users()
            .replace_one(doc! { "_id": &user.id }, user, None)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => Err(AuthError::AlreadyExists),
            Err(e) => Err(e.into()),
        }
    }

    async fn ping(&self) -> Result<(), AuthError> {
        self.db.run_command(doc! { "ping": 1 }, None).await?;
        Ok(())
    }
}

#[async_trait]
impl OtpStore for MongoDb {
    async fn issue(&self, record: OtpRecord) -> Result<(), AuthError> {
        let options = ReplaceOptions::builder().upsert(true).build();
        self.otps()
            .replace_one(doc! { "_id": &record.email }, &record, options)
            .await?;
        Ok(())
    }

    async fn consume(
        &self,
        email: &str,
        code_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, AuthError> {
        let now = bson_time(now);
        let accepted = self
            .otps()
            .find_one_and_delete(
                doc! {
                    "_id": email,
                    "code_hash": code_hash,
                    "attempts": { "$lt": MAX_OTP_ATTEMPTS },
                    "expires_at": { "$gt": now },
                },
                None,
            )
            .await?;

        if accepted.is_some() {
            return Ok(true);
        }

        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let counted = self
            .otps()
            .find_one_and_update(
                doc! { "_id": email, "expires_at": { "$gt": now } },
                doc! { "$inc": { "attempts": 1 } },
                options,
            )
            .await?;

        if counted.map_or(true, |record| record.is_exhausted()) {
            self.otps()
                .delete_one(
                    doc! {
                        "_id": email,
                        "$or": [
                            { "expires_at": { "$lte": now } },
                            { "attempts": { "$gte": MAX_OTP_ATTEMPTS } },
                        ]
                    },
                    None,
                )
                .await?;
        }

        Ok(false)
    }

    async fn revoke(&self, email: &str) -> Result<(), AuthError> {
        self.otps().delete_many(doc! { "_id": email }, None).await?;
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, AuthError> {
        let result = self
            .otps()
            .delete_many(doc! { "expires_at": { "$lte": bson_time(now) } }, None)
            .await?;
        Ok(result.deleted_count)
    }
}

#[async_trait]
impl ResetTokenStore for MongoDb {
    async fn issue(&self, record: ResetTokenRecord) -> Result<(), AuthError> {
        let options = ReplaceOptions::builder().upsert(true).build();
        self.reset_tokens()
            .replace_one(doc! { "_id": &record.email }, &record, options)
            .await?;
        Ok(())
    }

    async fn consume(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, AuthError> {
        let now = bson_time(now);
        let claimed = self
            .reset_tokens()
            .find_one_and_update(
                doc! {
                    "token_hash": token_hash,
                    "used": false,
                    "expires_at": { "$gt": now },
                },
                doc! { "$set": { "used": true } },
                None,
            )
            .await?;

        match claimed {
            Some(record) => Ok(Some(record.email)),
            None => {
                self.reset_tokens()
                    .delete_many(
                        doc! { "token_hash": token_hash, "expires_at": { "$lte": now } },
                        None,
                    )
                    .await?;
                Ok(None)
            }
        }
    }

    async fn revoke(&self, email: &str) -> Result<(), AuthError> {
        self.reset_tokens()
            .delete_many(doc! { "_id": email }, None)
            .await?;
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, AuthError> {
        let result = self
            .reset_tokens()
            .delete_many(doc! { "expires_at": { "$lte": bson_time(now) } }, None)
            .await?;
        Ok(result.deleted_count)
    }
}

#[async_trait]
impl ResourceOwners for MongoDb {
    async fn owner_of(&self, kind: ResourceKind, id: &str) -> Result<Option<String>, AuthError> {
        let filter = match ObjectId::parse_str(id) {
            Ok(oid) => doc! { "_id": oid },
            Err(_) => doc! { "_id": id },
        };
        let options = FindOneOptions::builder()
            .projection(doc! { "userId": 1 })
            .build();

        let resource = self
            .db
            .collection::<Document>(kind.collection())
            .find_one(filter, options)
            .await?;

        // A document without an owner reference is treated as absent.
        Ok(resource.and_then(|d| match d.get(OWNER_FIELD) {
            Some(Bson::ObjectId(oid)) => Some(oid.to_hex()),
            Some(Bson::String(s)) => Some(s.clone()),
            _ => None,
        }))
    }
}
