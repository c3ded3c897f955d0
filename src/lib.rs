pub mod api;
pub mod auth;
pub mod cli;
pub mod db;
pub mod jwt;
pub mod password;
pub mod rate_limit;
pub mod session;

use api::create_api_router;
use axum::{Json, Router, routing::get};
use db::Database;
use jwt::JwtConfig;
use password::PasswordHasher;
use rate_limit::RateLimitConfig;
use serde::Serialize;
use session::SessionAuthority;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::net::TcpListener;

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// JWT secret for signing tokens
    pub jwt_secret: Vec<u8>,
    /// Whether to set Secure flag on cookies (should be true in production with HTTPS)
    pub secure_cookies: bool,
    pub password_hasher: PasswordHasher,
    /// Per-IP limits on register and login
    pub rate_limit: bool,
    /// Trust `X-Forwarded-For` for the client IP (requires running behind a proxy)
    pub trust_proxy: bool,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    message: &'static str,
    timestamp: u64,
}

async fn health() -> Json<HealthResponse> {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    Json(HealthResponse {
        status: "OK",
        message: "Server is running",
        timestamp,
    })
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let jwt = Arc::new(JwtConfig::new(&config.jwt_secret));

    let sessions = SessionAuthority::new(
        config.db.clone(),
        jwt.clone(),
        Arc::new(config.password_hasher.clone()),
    );

    let rate_limit_config = config
        .rate_limit
        .then(|| Arc::new(RateLimitConfig::new(config.trust_proxy)));

    let api_router = create_api_router(
        config.db.clone(),
        jwt,
        sessions,
        config.secure_cookies,
        rate_limit_config,
    );

    Router::new()
        .route("/health", get(health))
        .nest("/api", api_router)
}

/// Run the server on the given listener. This function blocks until the server exits.
pub async fn run_server(
    config: ServerConfig,
    listener: TcpListener,
) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}
