pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use axum::extract::DefaultBodyLimit;
use serde::Serialize;
use service_core::axum::{
    extract::State,
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{from_fn, from_fn_with_state},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use service_core::middleware::{
    rate_limit::{ip_rate_limit_middleware, IpRateLimiter},
    security_headers::security_headers_middleware,
    tracing::{request_id_middleware, REQUEST_ID_HEADER},
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi, ToSchema,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::config::UserServiceConfig;
use crate::services::{AuthService, ResourceOwners, UserStore};
use service_core::error::AppError;

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        handlers::auth::registration::send_otp,
        handlers::auth::registration::verify_otp_register,
        handlers::auth::session::login,
        handlers::auth::session::logout,
        handlers::auth::password::forgot_password,
        handlers::auth::password::reset_password,
        handlers::auth::social::google_login,
        handlers::user::get_profile,
        handlers::user::update_profile,
        handlers::user::change_password,
    ),
    components(
        schemas(
            HealthResponse,
            dtos::ErrorResponse,
            dtos::auth::SendOtpRequest,
            dtos::auth::VerifyOtpRequest,
            dtos::auth::LoginRequest,
            dtos::auth::ForgotPasswordRequest,
            dtos::auth::ResetPasswordRequest,
            dtos::auth::ChangePasswordRequest,
            dtos::auth::GoogleLoginRequest,
            dtos::auth::UpdateProfileForm,
            dtos::auth::MessageResponse,
            dtos::auth::LogoutResponse,
            dtos::auth::LoginResponse,
            dtos::auth::RegisterResponse,
            dtos::auth::SessionResponse,
            dtos::auth::ProfileResponse,
            dtos::auth::UpdateProfileResponse,
            models::UserResponse,
            models::AuthProvider,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Authentication", description = "Registration, login, password reset and Google sign-in"),
        (name = "User", description = "User profile management"),
        (name = "Observability", description = "Service health and monitoring"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: UserServiceConfig,
    pub auth_service: AuthService,
    pub users: Arc<dyn UserStore>,
    pub resource_owners: Arc<dyn ResourceOwners>,
    pub login_rate_limiter: IpRateLimiter,
    pub otp_rate_limiter: IpRateLimiter,
    pub password_reset_rate_limiter: IpRateLimiter,
    pub ip_rate_limiter: IpRateLimiter,
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "healthy")]
    pub status: String,
    #[schema(example = "user-service")]
    pub service: String,
    #[schema(example = "1.0.0")]
    pub version: String,
    #[schema(value_type = Object)]
    pub checks: serde_json::Value,
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Database unreachable", body = HealthResponse)
    ),
    tag = "Observability"
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let (status, db_status) = match state.users.ping().await {
        Ok(()) => (StatusCode::OK, "up"),
        Err(e) => {
            tracing::error!(error = %e, "Health check: database unreachable");
            (StatusCode::SERVICE_UNAVAILABLE, "down")
        }
    };

    (
        status,
        Json(HealthResponse {
            status: if status == StatusCode::OK { "healthy" } else { "unhealthy" }.to_string(),
            service: state.config.service_name.clone(),
            version: state.config.service_version.clone(),
            checks: serde_json::json!({ "database": db_status }),
        }),
    )
}

/// Room for a maximum-size avatar plus the other multipart fields.
const UPDATE_PROFILE_BODY_LIMIT: usize = services::avatar::MAX_AVATAR_BYTES + 64 * 1024;

pub async fn build_router(state: AppState) -> Result<Router, AppError> {
    let login_route = Router::new()
        .route("/user/login", post(handlers::login))
        .layer(from_fn_with_state(
            state.login_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let otp_route = Router::new()
        .route("/user/send-otp", post(handlers::send_otp))
        .layer(from_fn_with_state(
            state.otp_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let reset_request_route = Router::new()
        .route("/user/forgot-password", post(handlers::forgot_password))
        .layer(from_fn_with_state(
            state.password_reset_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let protected_routes = Router::new()
        .route("/user/profile", get(handlers::get_profile))
        .route("/user/logout", get(handlers::logout))
        .route("/user/change-password", post(handlers::change_password))
        .route(
            "/user/update-profile",
            put(handlers::update_profile).layer(DefaultBodyLimit::max(UPDATE_PROFILE_BODY_LIMIT)),
        )
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    let mut app = Router::new().route("/health", get(health_check));

    if state.config.swagger_enabled {
        app =
            app.merge(SwaggerUi::new("/docs").url("/.well-known/openapi.json", ApiDoc::openapi()));
    } else {
        app = app.route(
            "/.well-known/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        );
    }

    let app = app
        .route("/user/verify-otp-register", post(handlers::verify_otp_register))
        .route("/user/reset-password", post(handlers::reset_password))
        .route("/user/google-login", post(handlers::google_login))
        .merge(login_route)
        .merge(otp_route)
        .merge(reset_request_route)
        .merge(protected_routes)
        .with_state(state.clone())
        .layer(from_fn_with_state(
            state.ip_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &service_core::axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors_layer(&state.config.security.allowed_origins));

    Ok(app)
}

/// Credentialed CORS for the configured origins; invalid entries are skipped.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins = allowed_origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!("Invalid CORS origin '{}': {}. Skipping.", o, e);
                None
            }
        })
        .collect::<Vec<HeaderValue>>();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}
