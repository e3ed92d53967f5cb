pub mod api;
pub mod auth;
pub mod cli;
pub mod db;
pub mod jwt;
pub mod password;
pub mod rate_limit;

use api::{ApiConfig, create_api_router};
use axum::{
    Json, Router,
    http::{HeaderValue, Method, header},
    routing::get,
};
use db::Database;
use jwt::{ConfigurationError, JwtConfig};
use rate_limit::RateLimitConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// Secret for signing access tokens
    pub access_token_secret: Vec<u8>,
    /// Secret for signing refresh tokens, must differ from the access secret
    pub refresh_token_secret: Vec<u8>,
    /// Whether to set Secure flag on cookies (should be true in production with HTTPS)
    pub secure_cookies: bool,
    /// Upper bound on the credential store lookup at login
    pub store_timeout: Duration,
    /// bcrypt cost for new password hashes
    pub bcrypt_cost: u32,
    /// Per-IP budget for login and registration attempts
    pub login_attempts_per_minute: u32,
    /// Origins allowed to make credentialed cross-origin calls.
    /// Empty means any origin, without credentials.
    pub cors_origins: Vec<HeaderValue>,
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid configuration: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn cors_layer(origins: &[HeaderValue]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    // Cookies only cross origins with an explicit allow-list
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins.iter().cloned()))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

/// Create the application router with the given configuration.
/// Fails when the signing secrets are unusable.
pub fn create_app(config: &ServerConfig) -> Result<Router, ConfigurationError> {
    let jwt = Arc::new(JwtConfig::new(
        &config.access_token_secret,
        &config.refresh_token_secret,
    )?);

    let api_router = create_api_router(
        config.db.clone(),
        jwt,
        ApiConfig {
            secure_cookies: config.secure_cookies,
            store_timeout: config.store_timeout,
            bcrypt_cost: config.bcrypt_cost,
            rate_limit: RateLimitConfig::new(config.login_attempts_per_minute),
        },
    );

    Ok(Router::new()
        .route(
            "/",
            get(|| async { Json(serde_json::json!({ "message": "Propelize API is running" })) }),
        )
        .merge(api_router)
        .layer(cors_layer(&config.cors_origins)))
}

/// Run the server on the given listener. This function blocks until the server exits.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), ServerError> {
    let app = create_app(&config)?;
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await?;
    Ok(())
}
