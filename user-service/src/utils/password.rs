use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString,
    },
    Algorithm, Argon2, Params, Version,
};
use async_trait::async_trait;

use crate::config::PasswordHashConfig;

pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Newtype for password to prevent accidental logging
#[derive(Clone)]
pub struct Password(String);

impl Password {
    pub fn new(password: String) -> Self {
        Self(password)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password(****)")
    }
}

/// One-way password hashing with a configurable work factor.
#[async_trait]
pub trait PasswordHasher: Send + Sync {
    async fn hash(&self, password: &Password) -> Result<String, anyhow::Error>;

    /// `Ok(false)` on mismatch; `Err` only when the stored hash is unreadable.
    async fn verify(&self, password: &Password, hash: &str) -> Result<bool, anyhow::Error>;
}

/// Argon2id hasher. Hashing runs on the blocking pool.
#[derive(Clone)]
pub struct Argon2Hasher {
    params: Params,
}

impl Argon2Hasher {
    pub fn new(config: &PasswordHashConfig) -> Result<Self, anyhow::Error> {
        let params = Params::new(
            config.memory_kib,
            config.iterations,
            Params::DEFAULT_P_COST,
            None,
        )
        .map_err(|e| anyhow::anyhow!("Invalid Argon2 parameters: {}", e))?;

        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

#[async_trait]
impl PasswordHasher for Argon2Hasher {
    async fn hash(&self, password: &Password) -> Result<String, anyhow::Error> {
        let argon2 = self.argon2();
        let password = password.clone();

        tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            argon2
                .hash_password(password.as_str().as_bytes(), &salt)
                .map(|hash| hash.to_string())
                .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))
        })
        .await?
    }

    async fn verify(&self, password: &Password, hash: &str) -> Result<bool, anyhow::Error> {
        let argon2 = self.argon2();
        let password = password.clone();
        let hash = hash.to_string();

        tokio::task::spawn_blocking(move || {
            let parsed_hash = PasswordHash::new(&hash)
                .map_err(|e| anyhow::anyhow!("Invalid password hash format: {}", e))?;

            // Parameters embedded in the hash win over the configured ones.
            Ok(argon2
                .verify_password(password.as_str().as_bytes(), &parsed_hash)
                .is_ok())
        })
        .await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> Argon2Hasher {
        Argon2Hasher::new(&PasswordHashConfig {
            iterations: 1,
            memory_kib: 64,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_hash_password() {
        let hash = hasher()
            .hash(&Password::new("secret1".to_string()))
            .await
            .unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(hash.contains("m=64,t=1"));
    }

    #[tokio::test]
    async fn test_verify_password() {
        let hasher = hasher();
        let password = Password::new("secret1".to_string());
        let hash = hasher.hash(&password).await.unwrap();

        assert!(hasher.verify(&password, &hash).await.unwrap());
        assert!(!hasher
            .verify(&Password::new("secret2".to_string()), &hash)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_different_hashes_for_same_password() {
        let hasher = hasher();
        let password = Password::new("secret1".to_string());
        let hash1 = hasher.hash(&password).await.unwrap();
        let hash2 = hasher.hash(&password).await.unwrap();

        assert_ne!(hash1, hash2);
    }

    #[tokio::test]
    async fn test_verify_against_malformed_hash_is_error() {
        let result = hasher()
            .verify(&Password::new("secret1".to_string()), "plaintext")
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_password_debug_is_redacted() {
        let password = Password::new("secret1".to_string());
        assert_eq!(format!("{:?}", password), "Password(****)");
    }
}
