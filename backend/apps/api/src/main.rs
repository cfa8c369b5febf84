//! API Server Entry Point
//!
//! Application entry point and server initialization.
//! Uses `anyhow` for startup errors, but request-level
//! errors go through `auth::AuthError` / `kernel::error::AppError`.

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use auth::{AuthConfig, AuthFacade, MemoryIdentityProvider, MemoryProviderConfig, auth_router};
use axum::{
    Router, http,
    http::{Method, header},
};
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const CLEANUP_INTERVAL: Duration = Duration::from_secs(15 * 60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "api=info,auth=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = auth_config_from_env()?;
    tracing::info!(
        fresh_age = config.fresh_age,
        update_age = config.update_age,
        cookie_secure = config.cookie_secure,
        "Auth configuration loaded"
    );

    let provider = MemoryIdentityProvider::new(MemoryProviderConfig {
        require_email_verification: env_or("AUTH_REQUIRE_EMAIL_VERIFICATION", false)?,
        ..MemoryProviderConfig::default()
    });

    // Periodic cleanup of expired sessions and reset tickets
    let cleanup_provider = provider.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            let removed = cleanup_provider.cleanup_expired().await;
            if removed > 0 {
                tracing::info!(removed, "Expired auth records cleaned up");
            }
        }
    });

    let facade = AuthFacade::new(provider, config);

    // CORS configuration
    let frontend_origins = env::var("FRONTEND_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:40922,http://127.0.0.1:40922".to_string());

    let allowed_origins: Vec<http::HeaderValue> = frontend_origins
        .split(',')
        .filter_map(|origin| origin.trim().parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods(AllowMethods::list([
            Method::GET,
            Method::POST,
            Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
        ]))
        .allow_credentials(true);

    // Build router
    let app = Router::new()
        .nest("/api/auth", auth_router(facade))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let addr: SocketAddr = env_or("AUTH_BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 31113)))?;
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Release builds default to secure cookies, debug builds to plain HTTP
fn auth_config_from_env() -> anyhow::Result<AuthConfig> {
    let base = if cfg!(debug_assertions) {
        AuthConfig::development()
    } else {
        AuthConfig::default()
    };

    Ok(AuthConfig {
        cookie_secure: env_or("AUTH_COOKIE_SECURE", base.cookie_secure)?,
        fresh_age: env_or("AUTH_FRESH_AGE_SECS", base.fresh_age)?,
        update_age: env_or("AUTH_UPDATE_AGE_SECS", base.update_age)?,
        default_redirect_url: env::var("AUTH_DEFAULT_REDIRECT_URL")
            .ok()
            .filter(|url| !url.trim().is_empty()),
        ..base
    })
}

fn env_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw}")),
        Err(_) => Ok(default),
    }
}
