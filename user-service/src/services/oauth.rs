use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::error::{AuthError, GrantFailure};
use crate::config::GoogleOAuthConfig;

const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v3/userinfo";

/// Identity asserted by the provider after a successful code exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederatedIdentity {
    pub subject: String,
    pub email: Option<String>,
    pub email_verified: bool,
    pub name: Option<String>,
    pub picture: Option<String>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Exchanges an authorization code for the caller's identity.
    ///
    /// Rejected codes surface as `AuthError::InvalidGrant`.
    async fn exchange_code(&self, code: &str) -> Result<FederatedIdentity, AuthError>;
}

pub struct GoogleIdentityProvider {
    http: reqwest::Client,
    client_id: String,
    client_secret: SecretString,
    redirect_uri: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Deserialize)]
struct UserInfo {
    sub: String,
    email: Option<String>,
    #[serde(default)]
    email_verified: Option<bool>,
    name: Option<String>,
    picture: Option<String>,
}

impl GoogleIdentityProvider {
    pub fn new(config: &GoogleOAuthConfig) -> Result<Self, anyhow::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
        })
    }
}

/// Maps an OAuth token endpoint error code to a grant failure reason.
pub fn classify_grant_error(error: &str, description: Option<&str>) -> GrantFailure {
    match error {
        "redirect_uri_mismatch" => GrantFailure::RedirectMismatch,
        "invalid_grant" => {
            if description.is_some_and(|d| d.to_lowercase().contains("redirect")) {
                GrantFailure::RedirectMismatch
            } else {
                GrantFailure::ExpiredCode
            }
        }
        _ => GrantFailure::Generic,
    }
}

#[async_trait]
impl IdentityProvider for GoogleIdentityProvider {
    async fn exchange_code(&self, code: &str) -> Result<FederatedIdentity, AuthError> {
        let response = self
            .http
            .post(GOOGLE_TOKEN_URL)
            .form(&[
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.expose_secret().as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Google token endpoint unreachable");
                AuthError::UpstreamFailure("Google login failed".to_string())
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let reason = match response.json::<TokenErrorResponse>().await {
                Ok(body) => {
                    tracing::warn!(
                        status = %status,
                        error = %body.error,
                        "Google rejected authorization code"
                    );
                    classify_grant_error(&body.error, body.error_description.as_deref())
                }
                Err(_) => GrantFailure::Generic,
            };
            return Err(AuthError::InvalidGrant(reason));
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "Malformed Google token response");
            AuthError::InvalidGrant(GrantFailure::Generic)
        })?;

        let info: UserInfo = self
            .http
            .get(GOOGLE_USERINFO_URL)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                tracing::error!(error = %e, "Google userinfo request failed");
                AuthError::InvalidGrant(GrantFailure::Generic)
            })?
            .json()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Malformed Google userinfo response");
                AuthError::InvalidGrant(GrantFailure::Generic)
            })?;

        Ok(FederatedIdentity {
            subject: info.sub,
            email: info.email,
            email_verified: info.email_verified.unwrap_or(false),
            name: info.name,
            picture: info.picture,
        })
    }
}

/// Used when no Google client is configured.
pub struct DisabledIdentityProvider;

#[async_trait]
impl IdentityProvider for DisabledIdentityProvider {
    async fn exchange_code(&self, _code: &str) -> Result<FederatedIdentity, AuthError> {
        Err(AuthError::UpstreamFailure(
            "Google sign-in is not configured".to_string(),
        ))
    }
}

/// Answers from a fixed table of codes; unknown codes fail as `Generic`.
#[derive(Clone, Default)]
pub struct MockIdentityProvider {
    outcomes: Arc<Mutex<HashMap<String, Result<FederatedIdentity, GrantFailure>>>>,
}

impl MockIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accept(&self, code: &str, identity: FederatedIdentity) {
        if let Ok(mut outcomes) = self.outcomes.lock() {
            outcomes.insert(code.to_string(), Ok(identity));
        }
    }

    pub fn reject(&self, code: &str, reason: GrantFailure) {
        if let Ok(mut outcomes) = self.outcomes.lock() {
            outcomes.insert(code.to_string(), Err(reason));
        }
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    async fn exchange_code(&self, code: &str) -> Result<FederatedIdentity, AuthError> {
        let outcome = self
            .outcomes
            .lock()
            .ok()
            .and_then(|outcomes| outcomes.get(code).cloned())
            .unwrap_or(Err(GrantFailure::Generic));

        outcome.map_err(AuthError::InvalidGrant)
    }
}
