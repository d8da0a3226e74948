use service_core::middleware::rate_limit::{create_ip_rate_limiter, spawn_rate_limit_pruner};
use service_core::observability::logging::init_tracing;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use user_service::{
    build_router,
    config::UserServiceConfig,
    services::{
        spawn_token_sweeper, AuthService, AuthSettings, AvatarStore, CloudinaryAvatarStore,
        Collaborators, ConsoleEmailService, DisabledAvatarStore, DisabledIdentityProvider,
        EmailProvider, GoogleIdentityProvider, IdentityProvider, MongoDb, SessionIssuer,
        SmtpEmailService, SystemClock,
    },
    utils::Argon2Hasher,
    AppState,
};

#[tokio::main]
async fn main() -> Result<(), service_core::error::AppError> {
    // Load configuration - fail fast if invalid
    let config = UserServiceConfig::from_env()?;

    service_core::error::expose_internal_details(config.is_dev());

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    );

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting user service"
    );

    tracing::info!("Initializing database connection");
    let db = MongoDb::connect(&config.mongodb.uri, &config.mongodb.database).await?;
    db.initialize_indexes().await?;
    tracing::info!("Database initialized successfully");

    let email: Arc<dyn EmailProvider> = match &config.smtp {
        Some(smtp) => Arc::new(SmtpEmailService::new(smtp)?),
        None => {
            tracing::warn!("SMTP not configured; emails will be written to the log");
            Arc::new(ConsoleEmailService)
        }
    };

    let identity: Arc<dyn IdentityProvider> = match &config.google {
        Some(google) => Arc::new(GoogleIdentityProvider::new(google)?),
        None => {
            tracing::warn!("Google OAuth not configured; Google sign-in is disabled");
            Arc::new(DisabledIdentityProvider)
        }
    };

    let avatars: Arc<dyn AvatarStore> = match &config.cloudinary {
        Some(cloudinary) => Arc::new(CloudinaryAvatarStore::new(cloudinary)?),
        None => {
            tracing::warn!("Cloudinary not configured; avatar uploads are disabled");
            Arc::new(DisabledAvatarStore)
        }
    };

    let db = Arc::new(db);
    let clock = Arc::new(SystemClock);
    let hasher = Arc::new(Argon2Hasher::new(&config.password)?);

    let deps = Collaborators {
        users: db.clone(),
        otps: db.clone(),
        reset_tokens: db.clone(),
        email,
        identity,
        avatars,
        hasher,
        clock: clock.clone(),
    };

    let settings = AuthSettings {
        otp_ttl: chrono::Duration::minutes(config.tokens.otp_ttl_minutes),
        reset_token_ttl: chrono::Duration::minutes(config.tokens.reset_token_ttl_minutes),
        frontend_url: config.frontend_url.trim_end_matches('/').to_string(),
    };

    let auth_service = AuthService::new(deps, SessionIssuer::new(&config.jwt), settings);
    tracing::info!("Auth service initialized");

    // The TTL indexes remove expired records eventually; the sweeper keeps the lag short.
    if config.tokens.sweep_interval_seconds > 0 {
        spawn_token_sweeper(
            db.clone(),
            db.clone(),
            clock,
            std::time::Duration::from_secs(config.tokens.sweep_interval_seconds),
        );
    }

    let login_rate_limiter = create_ip_rate_limiter(
        config.rate_limit.login_attempts,
        config.rate_limit.login_window_seconds,
        config.rate_limit.trust_forwarded_for,
    );
    let otp_rate_limiter = create_ip_rate_limiter(
        config.rate_limit.otp_attempts,
        config.rate_limit.otp_window_seconds,
        config.rate_limit.trust_forwarded_for,
    );
    let password_reset_rate_limiter = create_ip_rate_limiter(
        config.rate_limit.password_reset_attempts,
        config.rate_limit.password_reset_window_seconds,
        config.rate_limit.trust_forwarded_for,
    );
    let ip_rate_limiter = create_ip_rate_limiter(
        config.rate_limit.global_ip_limit,
        config.rate_limit.global_ip_window_seconds,
        config.rate_limit.trust_forwarded_for,
    );
    tracing::info!(
        trust_forwarded_for = config.rate_limit.trust_forwarded_for,
        "Rate limiters initialized: Login, OTP, Password Reset and Global IP"
    );

    if config.rate_limit.prune_interval_seconds > 0 {
        spawn_rate_limit_pruner(
            vec![
                login_rate_limiter.clone(),
                otp_rate_limiter.clone(),
                password_reset_rate_limiter.clone(),
                ip_rate_limiter.clone(),
            ],
            std::time::Duration::from_secs(config.rate_limit.prune_interval_seconds),
        );
    }

    let state = AppState {
        config: config.clone(),
        auth_service,
        users: db.clone(),
        resource_owners: db,
        login_rate_limiter,
        otp_rate_limiter,
        password_reset_rate_limiter,
        ip_rate_limiter,
    };

    let app = build_router(state).await?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));

    let service_span = tracing::info_span!(
        "service",
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
    );
    let _guard = service_span.enter();

    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    service_core::axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
