//! Shared setup for user-service integration tests.
//!
//! Builds the real router over the in-memory store and mock collaborators,
//! so no MongoDB, SMTP server or Google endpoint is needed.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use secrecy::SecretString;
use serde_json::Value;
use service_core::middleware::rate_limit::create_ip_rate_limiter;
use std::sync::{Arc, Once};
use tower::util::ServiceExt;
use user_service::{
    build_router,
    config::{
        Environment, JwtConfig, MongoConfig, OwnershipPolicy, PasswordHashConfig,
        RateLimitConfig, SecurityConfig, TokenConfig, UserServiceConfig,
    },
    services::{
        AuthService, AuthSettings, Collaborators, FederatedIdentity, InMemoryStore, ManualClock,
        MockAvatarStore, MockEmailService, MockIdentityProvider, SessionIssuer,
    },
    utils::Argon2Hasher,
    AppState,
};

pub const FRONTEND_URL: &str = "http://localhost:5173";

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once). Set `RUST_LOG` to see output.
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                std::env::var("RUST_LOG").unwrap_or_else(|_| "warn,user_service=info".to_string()),
            )
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub fn test_config() -> UserServiceConfig {
    UserServiceConfig {
        common: service_core::config::Config { port: 0 },
        environment: Environment::Dev,
        service_name: "user-service".to_string(),
        service_version: "1.0.0".to_string(),
        log_level: "error".to_string(),
        otlp_endpoint: None,
        mongodb: MongoConfig {
            uri: "mongodb://localhost:27017".to_string(),
            database: "budget_buddy_test".to_string(),
        },
        jwt: JwtConfig {
            secret: SecretString::new("integration-test-session-secret-0123456789".to_string()),
            session_ttl_hours: 24,
            federated_session_ttl_days: 7,
        },
        tokens: TokenConfig {
            otp_ttl_minutes: 10,
            reset_token_ttl_minutes: 15,
            sweep_interval_seconds: 0,
        },
        // Cheapest valid Argon2 cost keeps the suite fast.
        password: PasswordHashConfig {
            iterations: 1,
            memory_kib: 64,
        },
        google: None,
        smtp: None,
        cloudinary: None,
        frontend_url: FRONTEND_URL.to_string(),
        security: SecurityConfig {
            allowed_origins: vec![FRONTEND_URL.to_string()],
            ownership_policy: OwnershipPolicy::Distinguish,
        },
        swagger_enabled: false,
        rate_limit: RateLimitConfig {
            login_attempts: 1000,
            login_window_seconds: 60,
            otp_attempts: 1000,
            otp_window_seconds: 60,
            password_reset_attempts: 1000,
            password_reset_window_seconds: 60,
            global_ip_limit: 10_000,
            global_ip_window_seconds: 60,
            trust_forwarded_for: false,
            prune_interval_seconds: 0,
        },
    }
}

/// Parsed response: status, headers and JSON body (`Null` when empty).
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn message(&self) -> &str {
        self.body["message"].as_str().unwrap_or_default()
    }

    pub fn token(&self) -> String {
        self.body["token"]
            .as_str()
            .expect("response has no token")
            .to_string()
    }

    /// Every `Set-Cookie` header value.
    pub fn set_cookies(&self) -> Vec<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect()
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: InMemoryStore,
    pub email: MockEmailService,
    pub identity: MockIdentityProvider,
    pub avatars: MockAvatarStore,
    pub clock: ManualClock,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(test_config()).await
    }

    pub async fn spawn_with(config: UserServiceConfig) -> Self {
        init_tracing();

        let store = InMemoryStore::new();
        let email = MockEmailService::new();
        let identity = MockIdentityProvider::new();
        let avatars = MockAvatarStore::new();
        let clock = ManualClock::default();

        let state = build_state(
            config,
            store.clone(),
            email.clone(),
            identity.clone(),
            avatars.clone(),
            clock.clone(),
        );
        let router = build_router(state.clone())
            .await
            .expect("Failed to build router");

        TestApp {
            router,
            state,
            store,
            email,
            identity,
            avatars,
            clock,
        }
    }

    pub async fn request(&self, request: Request<Body>) -> TestResponse {
        send(self.router.clone(), request).await
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> TestResponse {
        self.request(json_request(Method::POST, uri, &body, None)).await
    }

    pub async fn post_json_authed(&self, uri: &str, body: Value, token: &str) -> TestResponse {
        self.request(json_request(Method::POST, uri, &body, Some(token)))
            .await
    }

    pub async fn get_authed(&self, uri: &str, token: &str) -> TestResponse {
        self.request(
            Request::builder()
                .method(Method::GET)
                .uri(uri)
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.request(
            Request::builder()
                .method(Method::GET)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    /// Runs send-otp and verify-otp-register; returns the 201 response.
    pub async fn register(&self, name: &str, email: &str, password: &str) -> TestResponse {
        let res = self
            .post_json(
                "/user/send-otp",
                serde_json::json!({ "name": name, "email": email, "password": password }),
            )
            .await;
        assert_eq!(res.status, StatusCode::OK, "send-otp failed: {}", res.body);

        let otp = self
            .email
            .last_otp(&email.trim().to_lowercase())
            .expect("no OTP was sent");

        let res = self
            .post_json(
                "/user/verify-otp-register",
                serde_json::json!({
                    "name": name,
                    "email": email,
                    "password": password,
                    "otp": otp,
                }),
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED, "verify failed: {}", res.body);
        res
    }

    /// Session token for a freshly registered local user.
    pub async fn register_token(&self, name: &str, email: &str, password: &str) -> String {
        self.register(name, email, password).await.token()
    }

    pub async fn login(&self, email: &str, password: &str) -> TestResponse {
        self.post_json(
            "/user/login",
            serde_json::json!({ "email": email, "password": password }),
        )
        .await
    }

    /// Makes `code` exchange to a verified Google identity.
    pub fn accept_google_code(&self, code: &str, subject: &str, email: &str, name: &str) {
        self.identity.accept(
            code,
            FederatedIdentity {
                subject: subject.to_string(),
                email: Some(email.to_string()),
                email_verified: true,
                name: Some(name.to_string()),
                picture: Some(format!("https://lh3.googleusercontent.test/{}", subject)),
            },
        );
    }
}

pub fn build_state(
    config: UserServiceConfig,
    store: InMemoryStore,
    email: MockEmailService,
    identity: MockIdentityProvider,
    avatars: MockAvatarStore,
    clock: ManualClock,
) -> AppState {
    let store = Arc::new(store);
    let hasher = Argon2Hasher::new(&config.password).expect("Failed to create hasher");

    let deps = Collaborators {
        users: store.clone(),
        otps: store.clone(),
        reset_tokens: store.clone(),
        email: Arc::new(email),
        identity: Arc::new(identity),
        avatars: Arc::new(avatars),
        hasher: Arc::new(hasher),
        clock: Arc::new(clock),
    };
    let settings = AuthSettings {
        otp_ttl: chrono::Duration::minutes(config.tokens.otp_ttl_minutes),
        reset_token_ttl: chrono::Duration::minutes(config.tokens.reset_token_ttl_minutes),
        frontend_url: config.frontend_url.clone(),
    };
    let auth_service = AuthService::new(deps, SessionIssuer::new(&config.jwt), settings);

    AppState {
        login_rate_limiter: create_ip_rate_limiter(
            config.rate_limit.login_attempts,
            config.rate_limit.login_window_seconds,
            config.rate_limit.trust_forwarded_for,
        ),
        otp_rate_limiter: create_ip_rate_limiter(
            config.rate_limit.otp_attempts,
            config.rate_limit.otp_window_seconds,
            config.rate_limit.trust_forwarded_for,
        ),
        password_reset_rate_limiter: create_ip_rate_limiter(
            config.rate_limit.password_reset_attempts,
            config.rate_limit.password_reset_window_seconds,
            config.rate_limit.trust_forwarded_for,
        ),
        ip_rate_limiter: create_ip_rate_limiter(
            config.rate_limit.global_ip_limit,
            config.rate_limit.global_ip_window_seconds,
            config.rate_limit.trust_forwarded_for,
        ),
        config,
        auth_service,
        users: store.clone(),
        resource_owners: store,
    }
}

pub async fn send(router: Router, request: Request<Body>) -> TestResponse {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

    TestResponse {
        status,
        headers,
        body,
    }
}

pub fn json_request(method: Method, uri: &str, body: &Value, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// Hand-built `multipart/form-data` body.
pub struct MultipartForm {
    boundary: String,
    body: Vec<u8>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self {
            boundary: "----budgetbuddyboundary7MA4YWxk".to_string(),
            body: Vec::new(),
        }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                self.boundary, name, value
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                self.boundary, name, file_name, content_type
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn into_request(mut self, uri: &str, token: &str) -> Request<Body> {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());

        Request::builder()
            .method(Method::PUT)
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", self.boundary),
            )
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::from(self.body))
            .unwrap()
    }
}
