use secrecy::{ExposeSecret, SecretString};
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct UserServiceConfig {
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub mongodb: MongoConfig,
    pub jwt: JwtConfig,
    pub tokens: TokenConfig,
    pub password: PasswordHashConfig,
    pub google: Option<GoogleOAuthConfig>,
    pub smtp: Option<SmtpConfig>,
    pub cloudinary: Option<CloudinaryConfig>,
    pub frontend_url: String,
    pub security: SecurityConfig,
    pub swagger_enabled: bool,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: SecretString,
    pub session_ttl_hours: i64,
    pub federated_session_ttl_days: i64,
}

#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub otp_ttl_minutes: i64,
    pub reset_token_ttl_minutes: i64,
    /// Zero disables the background sweep; TTL indexes still apply.
    pub sweep_interval_seconds: u64,
}

/// Argon2id work factor.
#[derive(Debug, Clone)]
pub struct PasswordHashConfig {
    pub iterations: u32,
    pub memory_kib: u32,
}

#[derive(Debug, Clone)]
pub struct GoogleOAuthConfig {
    pub client_id: String,
    pub client_secret: SecretString,
    pub redirect_uri: String,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: SecretString,
    pub from_name: String,
}

#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub upload_preset: String,
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
    pub ownership_policy: OwnershipPolicy,
}

/// How the resource guard answers for a resource that exists but belongs to
/// another user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnershipPolicy {
    /// 404 for missing resources, 401 for foreign ones.
    Distinguish,
    /// 404 for both.
    Conceal,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub login_attempts: u32,
    pub login_window_seconds: u64,
    pub otp_attempts: u32,
    pub otp_window_seconds: u64,
    pub password_reset_attempts: u32,
    pub password_reset_window_seconds: u64,
    pub global_ip_limit: u32,
    pub global_ip_window_seconds: u64,
    /// Key on the last `x-forwarded-for` hop. Only safe behind a proxy that sets it.
    pub trust_forwarded_for: bool,
    pub prune_interval_seconds: u64,
}

impl UserServiceConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let google = match optional_env("GOOGLE_CLIENT_ID") {
            Some(client_id) => Some(GoogleOAuthConfig {
                client_id,
                client_secret: SecretString::new(get_env("GOOGLE_CLIENT_SECRET", None, true)?),
                redirect_uri: get_env("GOOGLE_REDIRECT_URI", Some("postmessage"), false)?,
            }),
            None => None,
        };

        let smtp = match optional_env("SMTP_HOST") {
            Some(host) => Some(SmtpConfig {
                host,
                port: parse_env("SMTP_PORT", "587")?,
                user: get_env("SMTP_USER", None, true)?,
                password: SecretString::new(get_env("SMTP_PASS", None, true)?),
                from_name: get_env("MAIL_FROM_NAME", Some("Budget Buddy"), false)?,
            }),
            None => None,
        };

        let cloudinary = match optional_env("CLOUDINARY_CLOUD_NAME") {
            Some(cloud_name) => Some(CloudinaryConfig {
                cloud_name,
                upload_preset: get_env("CLOUDINARY_UPLOAD_PRESET", None, true)?,
            }),
            None => None,
        };

        let config = UserServiceConfig {
            common: common_config,
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("user-service"), false)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), false)?,
            log_level: get_env("LOG_LEVEL", Some("info"), false)?,
            otlp_endpoint: optional_env("OTLP_ENDPOINT"),
            mongodb: MongoConfig {
                uri: get_env("MONGODB_URI", Some("mongodb://localhost:27017"), is_prod)?,
                database: get_env("MONGODB_DATABASE", Some("budget_buddy"), is_prod)?,
            },
            jwt: JwtConfig {
                secret: SecretString::new(get_env(
                    "JWT_SECRET",
                    Some("dev-only-secret-change-me-before-deploying"),
                    is_prod,
                )?),
                session_ttl_hours: parse_env("SESSION_TTL_HOURS", "24")?,
                federated_session_ttl_days: parse_env("FEDERATED_SESSION_TTL_DAYS", "7")?,
            },
            tokens: TokenConfig {
                otp_ttl_minutes: parse_env("OTP_TTL_MINUTES", "10")?,
                reset_token_ttl_minutes: parse_env("RESET_TOKEN_TTL_MINUTES", "60")?,
                sweep_interval_seconds: parse_env("TOKEN_SWEEP_INTERVAL_SECONDS", "300")?,
            },
            password: PasswordHashConfig {
                iterations: parse_env("PASSWORD_HASH_ITERATIONS", "3")?,
                memory_kib: parse_env("PASSWORD_HASH_MEMORY_KIB", "19456")?,
            },
            google,
            smtp,
            cloudinary,
            frontend_url: get_env("FRONTEND_URL", Some("http://localhost:3000"), is_prod)?
                .trim_end_matches('/')
                .to_string(),
            security: SecurityConfig {
                allowed_origins: get_env(
                    "ALLOWED_ORIGINS",
                    Some("http://localhost:3000"),
                    is_prod,
                )?
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
                ownership_policy: get_env("OWNERSHIP_POLICY", Some("distinguish"), false)?
                    .parse()
                    .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?,
            },
            swagger_enabled: match optional_env("ENABLE_SWAGGER") {
                Some(v) => v.eq_ignore_ascii_case("true"),
                None => !is_prod,
            },
            rate_limit: RateLimitConfig {
                login_attempts: parse_env("RATE_LIMIT_LOGIN_ATTEMPTS", "5")?,
                login_window_seconds: parse_env("RATE_LIMIT_LOGIN_WINDOW_SECONDS", "900")?,
                otp_attempts: parse_env("RATE_LIMIT_OTP_ATTEMPTS", "3")?,
                otp_window_seconds: parse_env("RATE_LIMIT_OTP_WINDOW_SECONDS", "600")?,
                password_reset_attempts: parse_env("RATE_LIMIT_PASSWORD_RESET_ATTEMPTS", "3")?,
                password_reset_window_seconds: parse_env(
                    "RATE_LIMIT_PASSWORD_RESET_WINDOW_SECONDS",
                    "3600",
                )?,
                global_ip_limit: parse_env("RATE_LIMIT_GLOBAL_IP_LIMIT", "100")?,
                global_ip_window_seconds: parse_env("RATE_LIMIT_GLOBAL_IP_WINDOW_SECONDS", "60")?,
                trust_forwarded_for: parse_env("TRUST_PROXY_HEADERS", "false")?,
                prune_interval_seconds: parse_env("RATE_LIMIT_PRUNE_INTERVAL_SECONDS", "60")?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn is_dev(&self) -> bool {
        self.environment == Environment::Dev
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(config_error("PORT must be greater than 0"));
        }

        if self.jwt.session_ttl_hours <= 0 || self.jwt.federated_session_ttl_days <= 0 {
            return Err(config_error("Session TTLs must be positive"));
        }

        if self.tokens.otp_ttl_minutes <= 0 || self.tokens.reset_token_ttl_minutes <= 0 {
            return Err(config_error("Token TTLs must be positive"));
        }

        if self.password.iterations == 0 || self.password.memory_kib < 8 {
            return Err(config_error(
                "PASSWORD_HASH_ITERATIONS must be >= 1 and PASSWORD_HASH_MEMORY_KIB >= 8",
            ));
        }

        if self.environment == Environment::Prod {
            if self.jwt.secret.expose_secret().len() < 32 {
                return Err(config_error("JWT_SECRET must be at least 32 bytes in production"));
            }

            if self.security.allowed_origins.iter().any(|o| o == "*") {
                return Err(config_error("Wildcard CORS origin not allowed in production"));
            }

            if self.smtp.is_none() {
                return Err(config_error("SMTP_HOST is required in production"));
            }
        }

        Ok(())
    }
}

fn config_error(message: &str) -> AppError {
    AppError::ConfigError(anyhow::anyhow!(message.to_string()))
}

fn optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Reads `key`; with `strict` set the default is ignored and the variable must exist.
fn get_env(key: &str, default: Option<&str>, strict: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if strict {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

fn parse_env<T>(key: &str, default: &str) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env(key, Some(default), false)?
        .trim()
        .parse()
        .map_err(|e: T::Err| AppError::ConfigError(anyhow::anyhow!("{} is invalid: {}", key, e)))
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Dev),
            "prod" | "production" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

impl FromStr for OwnershipPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "distinguish" => Ok(OwnershipPolicy::Distinguish),
            "conceal" => Ok(OwnershipPolicy::Conceal),
            _ => Err(format!("Invalid ownership policy: {}", s)),
        }
    }
}
