use service_core::error::AppError;
use std::fmt;
use thiserror::Error;

/// Why a Google authorization code could not be exchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantFailure {
    RedirectMismatch,
    ExpiredCode,
    Generic,
}

impl fmt::Display for GrantFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrantFailure::RedirectMismatch => {
                write!(f, "Google sign-in failed: redirect URI mismatch")
            }
            GrantFailure::ExpiredCode => write!(
                f,
                "Google sign-in failed: authorization code expired or already used"
            ),
            GrantFailure::Generic => write!(f, "Invalid Google access token"),
        }
    }
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("User already exists")]
    AlreadyExists,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid or expired token")]
    InvalidOrExpiredToken,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("User not found")]
    NotFound,

    #[error("{0}")]
    ValidationError(String),

    #[error("{0}")]
    UpstreamFailure(String),

    #[error("{0}")]
    InvalidGrant(GrantFailure),

    #[error("Unable to get email from Google")]
    MissingEmail,

    #[error("Database error: {0}")]
    Database(anyhow::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<mongodb::error::Error> for AuthError {
    fn from(err: mongodb::error::Error) -> Self {
        AuthError::Database(anyhow::Error::new(err))
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        let message = err.to_string();
        match err {
            AuthError::AlreadyExists => AppError::Conflict(anyhow::anyhow!(message)),
            AuthError::InvalidCredentials => AppError::AuthError(anyhow::anyhow!(message)),
            AuthError::InvalidOrExpiredToken => AppError::BadRequest(anyhow::anyhow!(message)),
            AuthError::Unauthorized => AppError::Unauthorized(anyhow::anyhow!(message)),
            AuthError::NotFound => AppError::NotFound(anyhow::anyhow!(message)),
            AuthError::ValidationError(_) | AuthError::MissingEmail => {
                AppError::BadRequest(anyhow::anyhow!(message))
            }
            AuthError::UpstreamFailure(msg) => AppError::BadGateway(msg),
            AuthError::InvalidGrant(_) => AppError::AuthError(anyhow::anyhow!(message)),
            AuthError::Database(e) => AppError::DatabaseError(e),
            AuthError::Internal(e) => AppError::InternalError(e),
        }
    }
}
