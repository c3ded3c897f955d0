//! Rate limiting for registration and login.
//!
//! Uses a token bucket algorithm with per-IP tracking to slow down account
//! spam and password guessing.

use axum::{
    Json,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use serde_json::json;
use std::{net::IpAddr, num::NonZeroU32, sync::Arc};
use tracing::warn;

use crate::auth::extract_client_ip;

/// Per-IP rate limiter.
pub type IpLimiter = RateLimiter<IpAddr, DefaultKeyedStateStore<IpAddr>, DefaultClock>;

/// Registrations allowed per IP in a 15 minute window
const REGISTER_PER_WINDOW: NonZeroU32 = NonZeroU32::new(5).unwrap();
/// Login attempts allowed per IP in a 15 minute window
const LOGIN_PER_WINDOW: NonZeroU32 = NonZeroU32::new(3).unwrap();
/// One request is returned to the bucket per 15 minute window
const WINDOWS_PER_HOUR: NonZeroU32 = NonZeroU32::new(4).unwrap();

/// Allow `per_window` requests at once, then one more per window.
fn window_quota(per_window: NonZeroU32) -> Quota {
    Quota::per_hour(WINDOWS_PER_HOUR).allow_burst(per_window)
}

/// Rate limiting configuration for authentication endpoints.
#[derive(Clone)]
pub struct RateLimitConfig {
    pub register: Arc<IpLimiter>,
    pub login: Arc<IpLimiter>,
    /// Take the client IP from `X-Forwarded-For`
    pub trust_proxy: bool,
}

impl RateLimitConfig {
    pub fn new(trust_proxy: bool) -> Self {
        Self {
            register: Arc::new(RateLimiter::keyed(window_quota(REGISTER_PER_WINDOW))),
            login: Arc::new(RateLimiter::keyed(window_quota(LOGIN_PER_WINDOW))),
            trust_proxy,
        }
    }
}

fn too_many(message: &str) -> Response {
    (StatusCode::TOO_MANY_REQUESTS, Json(json!({ "error": message }))).into_response()
}

async fn limit(
    limiter: &IpLimiter,
    trust_proxy: bool,
    request: Request,
    next: Next,
    message: &str,
) -> Response {
    let ip = match extract_client_ip(&request, trust_proxy) {
        Ok(ip) => ip,
        Err(_) => {
            return (
                StatusCode::FORBIDDEN,
                Json(json!({ "error": "Unable to determine client IP" })),
            )
                .into_response();
        }
    };

    match limiter.check_key(&ip) {
        Ok(_) => next.run(request).await,
        Err(_) => {
            warn!(ip = %ip, path = %request.uri().path(), "Rate limit exceeded");
            too_many(message)
        }
    }
}

/// Middleware for rate limiting registration.
pub async fn rate_limit_register(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    limit(
        &config.register,
        config.trust_proxy,
        request,
        next,
        "Too many accounts created from this IP. Please try again later.",
    )
    .await
}

/// Middleware for rate limiting login.
pub async fn rate_limit_login(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    limit(
        &config.login,
        config.trust_proxy,
        request,
        next,
        "Too many login attempts. Please try again later.",
    )
    .await
}
