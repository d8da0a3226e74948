use chrono::Duration;
use std::sync::Arc;

use super::{
    avatar::{AvatarStore, AvatarUpload},
    clock::Clock,
    email::EmailProvider,
    error::AuthError,
    oauth::IdentityProvider,
    session::SessionIssuer,
    tokens::{generate_otp, generate_reset_token, hash_secret, OtpStore, ResetTokenStore},
    users::UserStore,
};
use crate::models::{OtpRecord, ResetTokenRecord, User};
use crate::utils::{is_valid_email, is_valid_password, normalize_email, Password, PasswordHasher};

const PASSWORD_TOO_SHORT: &str = "Password must be at least 6 characters long";

/// External collaborators the orchestrator drives.
#[derive(Clone)]
pub struct Collaborators {
    pub users: Arc<dyn UserStore>,
    pub otps: Arc<dyn OtpStore>,
    pub reset_tokens: Arc<dyn ResetTokenStore>,
    pub email: Arc<dyn EmailProvider>,
    pub identity: Arc<dyn IdentityProvider>,
    pub avatars: Arc<dyn AvatarStore>,
    pub hasher: Arc<dyn PasswordHasher>,
    pub clock: Arc<dyn Clock>,
}

#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub otp_ttl: Duration,
    pub reset_token_ttl: Duration,
    /// Base of the reset link, without trailing slash.
    pub frontend_url: String,
}

/// A user together with a freshly issued session token.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub user: User,
}

/// Registration, login, password and Google sign-in flows.
#[derive(Clone)]
pub struct AuthService {
    deps: Collaborators,
    sessions: SessionIssuer,
    settings: AuthSettings,
}

impl AuthService {
    pub fn new(deps: Collaborators, sessions: SessionIssuer, settings: AuthSettings) -> Self {
        Self {
            deps,
            sessions,
            settings,
        }
    }

    pub fn sessions(&self) -> &SessionIssuer {
        &self.sessions
    }

    /// Emails a one-time code that `confirm_registration` later exchanges
    /// for an account. No user row exists until then.
    pub async fn request_registration(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<(), AuthError> {
        let (_, email) = validate_registration(name, email, password)?;

        if self.deps.users.find_by_email(&email).await?.is_some() {
            return Err(AuthError::AlreadyExists);
        }

        let otp = generate_otp();
        let now = self.deps.clock.now();
        let record = OtpRecord::new(
            email.clone(),
            hash_secret(&otp),
            now,
            now + self.settings.otp_ttl,
        );
        self.deps.otps.issue(record).await?;

        if let Err(e) = self
            .deps
            .email
            .send_otp_email(&email, &otp, self.settings.otp_ttl.num_minutes())
            .await
        {
            tracing::error!(error = %e, "OTP dispatch failed, revoking code");
            self.deps.otps.revoke(&email).await?;
            return Err(AuthError::UpstreamFailure(
                "Failed to send OTP email".to_string(),
            ));
        }

        tracing::info!(email = %email, "Registration OTP issued");
        Ok(())
    }

    pub async fn confirm_registration(
        &self,
        name: &str,
        email: &str,
        password: &str,
        otp: &str,
    ) -> Result<AuthSession, AuthError> {
        let (name, email) = validate_registration(name, email, password)?;
        let otp = otp.trim();
        if otp.is_empty() {
            return Err(AuthError::ValidationError("OTP is required".to_string()));
        }

        if self.deps.users.find_by_email(&email).await?.is_some() {
            return Err(AuthError::AlreadyExists);
        }

        let now = self.deps.clock.now();
        if !self
            .deps
            .otps
            .consume(&email, &hash_secret(otp), now)
            .await?
        {
            return Err(AuthError::InvalidOrExpiredToken);
        }

        let password_hash = self
            .deps
            .hasher
            .hash(&Password::new(password.to_string()))
            .await?;
        let user = User::new_local(name, email, password_hash, now);
        self.deps.users.insert(&user).await?;

        tracing::info!(user_id = %user.id, "User registered");

        self.session_for(user, self.sessions.session_ttl())
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let email = normalize_email(email);
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::ValidationError(
                "Email and password are required".to_string(),
            ));
        }

        let user = self
            .deps
            .users
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::NotFound)?;

        // Google-only accounts have nothing to compare against.
        let Some(hash) = user.password_hash.as_deref() else {
            return Err(AuthError::InvalidCredentials);
        };

        if !self
            .deps
            .hasher
            .verify(&Password::new(password.to_string()), hash)
            .await?
        {
            tracing::warn!(user_id = %user.id, "Login failed: wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        if !user.is_active {
            return Err(AuthError::Unauthorized);
        }

        tracing::info!(user_id = %user.id, "User logged in");
        self.session_for(user, self.sessions.session_ttl())
    }

    /// Sends a reset link when the account exists. The caller answers the
    /// same way whether it does or not.
    pub async fn request_password_reset(&self, email: &str) -> Result<(), AuthError> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(AuthError::ValidationError("Email is required".to_string()));
        }

        // Unknown and inactive accounts return without touching the store or
        // SMTP, so they answer faster. Accepted: delivery stays synchronous so
        // a failed send reaches the caller.
        let Some(user) = self.deps.users.find_by_email(&email).await? else {
            tracing::info!("Password reset requested for unknown email");
            return Ok(());
        };
        if !user.is_active {
            tracing::info!(user_id = %user.id, "Password reset requested for inactive account");
            return Ok(());
        }

        let token = generate_reset_token();
        let now = self.deps.clock.now();
        let record = ResetTokenRecord::new(
            user.email.clone(),
            hash_secret(&token),
            now,
            now + self.settings.reset_token_ttl,
        );
        self.deps.reset_tokens.issue(record).await?;

        let reset_url = format!("{}/reset-password?token={}", self.settings.frontend_url, token);
        if let Err(e) = self
            .deps
            .email
            .send_password_reset_email(
                &user.email,
                &reset_url,
                self.settings.reset_token_ttl.num_minutes(),
            )
            .await
        {
            tracing::error!(error = %e, user_id = %user.id, "Reset email dispatch failed, revoking token");
            self.deps.reset_tokens.revoke(&user.email).await?;
            return Err(AuthError::UpstreamFailure(
                "Failed to send password reset email".to_string(),
            ));
        }

        tracing::info!(user_id = %user.id, "Password reset token issued");
        Ok(())
    }

    pub async fn reset_password(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<AuthSession, AuthError> {
        if !is_valid_password(new_password) {
            return Err(AuthError::ValidationError(PASSWORD_TOO_SHORT.to_string()));
        }
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::InvalidOrExpiredToken);
        }

        let now = self.deps.clock.now();
        let email = self
            .deps
            .reset_tokens
            .consume(&hash_secret(token), now)
            .await?
            .ok_or(AuthError::InvalidOrExpiredToken)?;

        let mut user = self
            .deps
            .users
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidOrExpiredToken)?;

        if !user.is_active {
            tracing::warn!(user_id = %user.id, "Password reset rejected: account inactive");
            return Err(AuthError::InvalidOrExpiredToken);
        }

        user.password_hash = Some(
            self.deps
                .hasher
                .hash(&Password::new(new_password.to_string()))
                .await?,
        );
        user.updated_at = now;
        self.deps.users.save(&user).await?;

        tracing::info!(user_id = %user.id, "Password reset completed");
        self.session_for(user, self.sessions.session_ttl())
    }

    pub async fn change_password(
        &self,
        user: &User,
        current_password: &str,
        new_password: &str,
    ) -> Result<AuthSession, AuthError> {
        let Some(hash) = user.password_hash.as_deref() else {
            return Err(AuthError::Unauthorized);
        };

        if !self
            .deps
            .hasher
            .verify(&Password::new(current_password.to_string()), hash)
            .await?
        {
            tracing::warn!(user_id = %user.id, "Password change rejected: wrong current password");
            return Err(AuthError::Unauthorized);
        }

        if !is_valid_password(new_password) {
            return Err(AuthError::ValidationError(PASSWORD_TOO_SHORT.to_string()));
        }

        let mut user = user.clone();
        user.password_hash = Some(
            self.deps
                .hasher
                .hash(&Password::new(new_password.to_string()))
                .await?,
        );
        user.updated_at = self.deps.clock.now();
        self.deps.users.save(&user).await?;

        tracing::info!(user_id = %user.id, "Password changed");
        self.session_for(user, self.sessions.session_ttl())
    }

    pub async fn update_profile(
        &self,
        user: &User,
        name: Option<String>,
        avatar: Option<AvatarUpload>,
    ) -> Result<AuthSession, AuthError> {
        let mut user = user.clone();

        if let Some(name) = name {
            let name = name.trim();
            if name.is_empty() {
                return Err(AuthError::ValidationError(
                    "Name cannot be empty".to_string(),
                ));
            }
            user.name = name.to_string();
        }

        if let Some(avatar) = avatar {
            avatar.validate()?;
            user.avatar_url = Some(self.deps.avatars.upload(&user.id, avatar).await?);
        }

        user.updated_at = self.deps.clock.now();
        self.deps.users.save(&user).await?;

        tracing::info!(user_id = %user.id, "Profile updated");
        self.session_for(user, self.sessions.session_ttl())
    }

    /// Signs a user in with a Google authorization code, creating or
    /// linking the account as needed.
    pub async fn federated_login(&self, code: &str) -> Result<AuthSession, AuthError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(AuthError::ValidationError(
                "Authorization code is required".to_string(),
            ));
        }

        let identity = self.deps.identity.exchange_code(code).await?;

        let email = identity
            .email
            .as_deref()
            .map(normalize_email)
            .filter(|e| !e.is_empty() && identity.email_verified)
            .ok_or(AuthError::MissingEmail)?;

        let now = self.deps.clock.now();
        let existing = self
            .deps
            .users
            .find_by_email_or_google_id(&email, &identity.subject)
            .await?;

        let user = match existing {
            Some(mut user) => {
                let mut changed = false;
                if user.google_id.is_none() {
                    user.google_id = Some(identity.subject.clone());
                    changed = true;
                }
                if user.avatar_url.is_none() && identity.picture.is_some() {
                    user.avatar_url = identity.picture.clone();
                    changed = true;
                }
                if changed {
                    user.updated_at = now;
                    self.deps.users.save(&user).await?;
                    tracing::info!(user_id = %user.id, "Linked Google identity to existing user");
                }
                user
            }
            None => {
                let name = identity
                    .name
                    .as_deref()
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .map(str::to_string)
                    .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());

                let user = User::new_federated(
                    name,
                    email.clone(),
                    identity.subject.clone(),
                    identity.picture.clone(),
                    now,
                );

                match self.deps.users.insert(&user).await {
                    Ok(()) => {
                        tracing::info!(user_id = %user.id, "User created from Google sign-in");
                        user
                    }
                    // Lost a race with a concurrent first sign-in.
                    Err(AuthError::AlreadyExists) => self
                        .deps
                        .users
                        .find_by_email_or_google_id(&email, &identity.subject)
                        .await?
                        .ok_or(AuthError::AlreadyExists)?,
                    Err(e) => return Err(e),
                }
            }
        };

        if !user.is_active {
            return Err(AuthError::Unauthorized);
        }

        self.session_for(user, self.sessions.federated_session_ttl())
    }

    /// Resolves a session token to its active user.
    pub async fn authenticate(&self, token: &str) -> Result<User, AuthError> {
        let claims = self
            .sessions
            .verify(token)
            .map_err(|_| AuthError::Unauthorized)?;

        match self.deps.users.find_by_id(&claims.sub).await? {
            Some(user) if user.is_active => Ok(user),
            _ => Err(AuthError::Unauthorized),
        }
    }

    fn session_for(&self, user: User, ttl: Duration) -> Result<AuthSession, AuthError> {
        let token = self.sessions.issue(&user, ttl, self.deps.clock.now())?;
        Ok(AuthSession { token, user })
    }
}

/// Trimmed name and normalized email, or the first rule violated.
fn validate_registration(
    name: &str,
    email: &str,
    password: &str,
) -> Result<(String, String), AuthError> {
    let name = name.trim();
    let email = normalize_email(email);

    if name.is_empty() || email.is_empty() || password.is_empty() {
        return Err(AuthError::ValidationError(
            "All fields are required".to_string(),
        ));
    }
    if !is_valid_email(&email) {
        return Err(AuthError::ValidationError(
            "Invalid email address".to_string(),
        ));
    }
    if !is_valid_password(password) {
        return Err(AuthError::ValidationError(PASSWORD_TOO_SHORT.to_string()));
    }

    Ok((name.to_string(), email))
}
