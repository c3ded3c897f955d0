#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, header},
    response::Response,
};
use cardkeep::{
    ServerConfig, create_app,
    db::Database,
    jwt::{Claims, TokenType},
    password::{HashCost, PasswordHasher},
};
use jsonwebtoken::{EncodingKey, Header};
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};
use tower::ServiceExt;

pub const TEST_SECRET: &[u8] = b"integration-test-secret-0123456789abcdef";

pub fn test_config(db: Database, rate_limit: bool) -> ServerConfig {
    ServerConfig {
        db,
        jwt_secret: TEST_SECRET.to_vec(),
        secure_cookies: false,
        password_hasher: PasswordHasher::new(HashCost::minimal()).unwrap(),
        rate_limit,
        trust_proxy: false,
    }
}

/// Create a test app without rate limiting and return (app, db).
pub async fn create_test_app() -> (Router, Database) {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    (create_app(&test_config(db.clone(), false)), db)
}

pub async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn authed_json_request(method: &str, uri: &str, token: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn authed_request(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

pub fn refresh_request(refresh_token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri("/api/auth/refresh");
    if let Some(token) = refresh_token {
        builder = builder.header(header::COOKIE, format!("refresh_token={}", token));
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn body_json(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// Raw Set-Cookie header for the refresh cookie, if any.
pub fn refresh_set_cookie(response: &Response) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("refresh_token="))
        .map(str::to_string)
}

/// Refresh token value from the Set-Cookie header, if non-empty.
pub fn refresh_token_from(response: &Response) -> Option<String> {
    let cookie = refresh_set_cookie(response)?;
    let value = cookie
        .strip_prefix("refresh_token=")?
        .split(';')
        .next()?
        .to_string();
    (!value.is_empty()).then_some(value)
}

/// Register an account and return (access_token, refresh_token).
pub async fn register(
    app: &Router,
    username: &str,
    email: &str,
    password: &str,
) -> (String, String) {
    let response = send(
        app,
        json_request(
            "POST",
            "/api/auth/register",
            serde_json::json!({ "username": username, "email": email, "password": password }),
        ),
    )
    .await;
    assert_eq!(response.status(), 201);
    let refresh = refresh_token_from(&response).expect("register sets refresh cookie");
    let json = body_json(response).await;
    let access = json["access_token"].as_str().unwrap().to_string();
    (access, refresh)
}

pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

/// Sign arbitrary claims with the test secret.
pub fn forge_token(
    sub: &str,
    token_version: i64,
    token_type: TokenType,
    iat: u64,
    exp: u64,
) -> String {
    let claims = Claims {
        sub: sub.to_string(),
        token_version,
        token_type,
        iat,
        exp,
    };
    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_SECRET),
    )
    .unwrap()
}
