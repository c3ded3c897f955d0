//! JWT token issuance and verification.
//!
//! Both token kinds share one claim shape and one signing secret. Signature
//! and expiry are checked here; the token version is compared against the
//! account by the session layer and the auth gate.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Token type for distinguishing access vs refresh tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// Short-lived access token (15 minutes), sent as a bearer header
    Access,
    /// Refresh token (1 day), sent as an HTTP-only cookie
    Refresh,
}

/// JWT claims carried by both access and refresh tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (account id)
    pub sub: String,
    /// Account token version at issuance
    #[serde(rename = "ver")]
    pub token_version: i64,
    /// Token type
    #[serde(rename = "typ")]
    pub token_type: TokenType,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Access token duration: 15 minutes
pub const ACCESS_TOKEN_DURATION_SECS: u64 = 15 * 60;

/// Refresh token duration: 1 day
pub const REFRESH_TOKEN_DURATION_SECS: u64 = 24 * 60 * 60;

/// Configuration for JWT operations.
#[derive(Clone)]
pub struct JwtConfig {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

/// A freshly issued access/refresh token pair.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub access_expires_in: u64,
    /// Refresh token lifetime in seconds (also the cookie Max-Age)
    pub refresh_expires_in: u64,
}

impl JwtConfig {
    /// Create a new JWT configuration with the given secret.
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        }
    }

    /// Issue an access/refresh pair for an account at the given token version.
    pub fn issue_pair(&self, subject: &str, token_version: i64) -> Result<TokenPair, JwtError> {
        let now = now_secs()?;

        let access_token = self.sign(
            subject,
            token_version,
            TokenType::Access,
            now,
            ACCESS_TOKEN_DURATION_SECS,
        )?;
        let refresh_token = self.sign(
            subject,
            token_version,
            TokenType::Refresh,
            now,
            REFRESH_TOKEN_DURATION_SECS,
        )?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            access_expires_in: ACCESS_TOKEN_DURATION_SECS,
            refresh_expires_in: REFRESH_TOKEN_DURATION_SECS,
        })
    }

    fn sign(
        &self,
        subject: &str,
        token_version: i64,
        token_type: TokenType,
        now: u64,
        duration: u64,
    ) -> Result<String, JwtError> {
        let claims = Claims {
            sub: subject.to_string(),
            token_version,
            token_type,
            iat: now,
            exp: now + duration,
        };

        jsonwebtoken::encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(JwtError::Encoding)
    }

    /// Verify signature and expiry and decode the claims.
    ///
    /// Does not check the token type; callers compare it against the usage
    /// context.
    pub fn verify(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
                _ => JwtError::Invalid,
            })
    }
}

fn now_secs() -> Result<u64, JwtError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|_| JwtError::TimeError)
}

/// Errors that can occur during JWT operations.
///
/// Verification collapses every failure other than expiry into `Invalid`.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("failed to encode token: {0}")]
    Encoding(jsonwebtoken::errors::Error),
    #[error("token has expired")]
    Expired,
    #[error("invalid token")]
    Invalid,
    #[error("system time error")]
    TimeError,
}
