//! Authentication API endpoints.
//!
//! - POST `/register` - Create an account and start a session
//! - POST `/login` - Start a session with email and password
//! - POST `/refresh` - Rotate the refresh cookie and issue a new access token
//! - POST `/logout` - Invalidate outstanding tokens and clear the cookie
//! - POST `/logout-all` - Same as logout, for every device
//! - GET/PUT `/profile` - Read or update the current account
//! - PUT `/change-password` - Replace the password

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::ApiError;
use super::validation::{
    validate_bio, validate_email, validate_password, validate_required, validate_username,
};
use crate::auth::{Auth, REFRESH_COOKIE_NAME, clear_refresh_cookie, get_cookie, refresh_cookie};
use crate::db::{Account, Database, GameStats, Profile, ProfileUpdate};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;
use crate::rate_limit::{RateLimitConfig, rate_limit_login, rate_limit_register};
use crate::session::{Session, SessionAuthority};

#[derive(Clone)]
pub struct AuthState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub sessions: SessionAuthority,
    pub secure_cookies: bool,
}

impl_has_auth_backend!(AuthState);

pub fn router(state: AuthState, rate_limit_config: Option<Arc<RateLimitConfig>>) -> Router {
    let register_router = Router::new()
        .route("/register", post(register))
        .with_state(state.clone());
    let login_router = Router::new()
        .route("/login", post(login))
        .with_state(state.clone());

    let (register_router, login_router) = match rate_limit_config {
        Some(config) => (
            register_router.layer(middleware::from_fn_with_state(
                config.clone(),
                rate_limit_register,
            )),
            login_router.layer(middleware::from_fn_with_state(config, rate_limit_login)),
        ),
        None => (register_router, login_router),
    };

    let session_router = Router::new()
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .route("/logout-all", post(logout_all))
        .route("/profile", get(get_profile).put(update_profile))
        .route("/change-password", put(change_password))
        .with_state(state);

    Router::new()
        .merge(register_router)
        .merge(login_router)
        .merge(session_router)
}

#[derive(Serialize)]
struct GameStatsResponse {
    games_played: i64,
    games_won: i64,
    total_score: i64,
    level: i64,
    win_rate: f64,
}

impl From<&GameStats> for GameStatsResponse {
    fn from(stats: &GameStats) -> Self {
        Self {
            games_played: stats.games_played,
            games_won: stats.games_won,
            total_score: stats.total_score,
            level: stats.level,
            win_rate: stats.win_rate(),
        }
    }
}

/// Public view of an account. Never carries the hash or token version.
#[derive(Serialize)]
struct AccountResponse {
    id: String,
    username: String,
    email: String,
    profile: Profile,
    game_stats: GameStatsResponse,
    last_login: Option<String>,
    created_at: String,
}

impl From<&Account> for AccountResponse {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id.clone(),
            username: account.username.clone(),
            email: account.email.clone(),
            profile: account.profile.clone(),
            game_stats: GameStatsResponse::from(&account.game_stats),
            last_login: account.last_login.clone(),
            created_at: account.created_at.clone(),
        }
    }
}

#[derive(Serialize)]
struct SessionResponse {
    message: &'static str,
    account: AccountResponse,
    access_token: String,
    expires_in: u64,
}

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

fn session_response(
    status: StatusCode,
    message: &'static str,
    session: Session,
    secure_cookies: bool,
) -> Response {
    let cookie = refresh_cookie(
        &session.tokens.refresh_token,
        session.tokens.refresh_expires_in,
        secure_cookies,
    );
    (
        status,
        [(SET_COOKIE, cookie)],
        Json(SessionResponse {
            message,
            account: AccountResponse::from(&session.account),
            access_token: session.tokens.access_token,
            expires_in: session.tokens.access_expires_in,
        }),
    )
        .into_response()
}

#[derive(Deserialize)]
struct RegisterRequest {
    username: String,
    email: String,
    password: String,
}

async fn register(
    State(state): State<AuthState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) = body?;
    let username = payload.username.trim();
    validate_username(username)?;
    validate_email(&payload.email)?;
    validate_password(&payload.password)?;

    let session = state
        .sessions
        .register(username, &payload.email, &payload.password)
        .await?;

    Ok(session_response(
        StatusCode::CREATED,
        "Account created",
        session,
        state.secure_cookies,
    ))
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

async fn login(
    State(state): State<AuthState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) = body?;
    validate_email(&payload.email)?;
    validate_required("Password", &payload.password)?;

    let session = state
        .sessions
        .login(&payload.email, &payload.password)
        .await?;

    Ok(session_response(
        StatusCode::OK,
        "Login successful",
        session,
        state.secure_cookies,
    ))
}

#[derive(Serialize)]
struct RefreshResponse {
    access_token: String,
    expires_in: u64,
}

/// Any failure also clears the refresh cookie so the client stops retrying it.
async fn refresh(State(state): State<AuthState>, headers: HeaderMap) -> Response {
    let token = get_cookie(&headers, REFRESH_COOKIE_NAME).filter(|t| !t.is_empty());

    match state.sessions.refresh(token).await {
        Ok(session) => {
            let cookie = refresh_cookie(
                &session.tokens.refresh_token,
                session.tokens.refresh_expires_in,
                state.secure_cookies,
            );
            (
                StatusCode::OK,
                [(SET_COOKIE, cookie)],
                Json(RefreshResponse {
                    access_token: session.tokens.access_token,
                    expires_in: session.tokens.access_expires_in,
                }),
            )
                .into_response()
        }
        Err(e) => (
            [(SET_COOKIE, clear_refresh_cookie(state.secure_cookies))],
            e,
        )
            .into_response(),
    }
}

async fn logout(
    State(state): State<AuthState>,
    Auth(auth): Auth,
) -> Result<impl IntoResponse, ApiError> {
    state.sessions.logout(&auth.account).await?;

    Ok((
        StatusCode::OK,
        [(SET_COOKIE, clear_refresh_cookie(state.secure_cookies))],
        Json(MessageResponse {
            message: "Logged out",
        }),
    ))
}

async fn logout_all(
    State(state): State<AuthState>,
    Auth(auth): Auth,
) -> Result<impl IntoResponse, ApiError> {
    state.sessions.logout_all_devices(&auth.account).await?;

    Ok((
        StatusCode::OK,
        [(SET_COOKIE, clear_refresh_cookie(state.secure_cookies))],
        Json(MessageResponse {
            message: "Logged out from all devices",
        }),
    ))
}

#[derive(Serialize)]
struct ProfileResponse {
    account: AccountResponse,
}

async fn get_profile(
    State(state): State<AuthState>,
    Auth(auth): Auth,
) -> Result<impl IntoResponse, ApiError> {
    let account = state.sessions.profile(&auth.account.id).await?;
    Ok(Json(ProfileResponse {
        account: AccountResponse::from(&account),
    }))
}

#[derive(Deserialize, Default)]
struct ProfileFields {
    first_name: Option<String>,
    last_name: Option<String>,
    avatar: Option<String>,
    bio: Option<String>,
}

#[derive(Deserialize)]
struct UpdateProfileRequest {
    username: Option<String>,
    profile: Option<ProfileFields>,
}

async fn update_profile(
    State(state): State<AuthState>,
    Auth(auth): Auth,
    body: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = body?;
    let username = payload.username.map(|u| u.trim().to_string());
    if let Some(username) = &username {
        validate_username(username)?;
    }
    let profile = payload.profile.unwrap_or_default();
    if let Some(bio) = &profile.bio {
        validate_bio(bio)?;
    }

    let update = ProfileUpdate {
        username,
        first_name: profile.first_name,
        last_name: profile.last_name,
        avatar: profile.avatar,
        bio: profile.bio,
    };
    let account = state
        .sessions
        .update_profile(&auth.account.id, &update)
        .await?;

    Ok(Json(ProfileResponse {
        account: AccountResponse::from(&account),
    }))
}

#[derive(Deserialize)]
struct ChangePasswordRequest {
    current_password: String,
    new_password: String,
}

async fn change_password(
    State(state): State<AuthState>,
    Auth(auth): Auth,
    body: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = body?;
    validate_required("Current password", &payload.current_password)?;
    validate_password(&payload.new_password)?;

    state
        .sessions
        .change_password(
            &auth.account.id,
            &payload.current_password,
            &payload.new_password,
        )
        .await?;

    Ok(Json(MessageResponse {
        message: "Password changed",
    }))
}
