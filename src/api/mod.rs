mod auth;
mod cards;
mod error;
mod validation;

use axum::Router;
use std::sync::Arc;

use crate::db::Database;
use crate::jwt::JwtConfig;
use crate::rate_limit::RateLimitConfig;
use crate::session::SessionAuthority;

pub use auth::AuthState;
pub use cards::CardsState;
pub use error::ApiError;

/// Create the API router.
pub fn create_api_router(
    db: Database,
    jwt: Arc<JwtConfig>,
    sessions: SessionAuthority,
    secure_cookies: bool,
    rate_limit_config: Option<Arc<RateLimitConfig>>,
) -> Router {
    let auth_state = auth::AuthState {
        db: db.clone(),
        jwt: jwt.clone(),
        sessions,
        secure_cookies,
    };

    let cards_state = cards::CardsState { db, jwt };

    Router::new()
        .nest("/auth", auth::router(auth_state, rate_limit_config))
        .nest("/cards", cards::router(cards_state))
}
