//! Authentication error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::db::IdentityField;

/// Coarse classification of an authentication failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Conflict,
    Unauthorized,
    Expired,
    Invalid,
    BadCredential,
    Internal,
}

/// Outcome of a failed session or auth gate operation.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Authentication required")]
    MissingCredential,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Access token expired")]
    AccessExpired,
    #[error("Refresh token expired")]
    RefreshExpired,
    #[error("Token has been invalidated")]
    TokenInvalidated,
    #[error("Account not found or inactive")]
    AccountUnavailable,
    /// Same message for unknown email, inactive account and wrong password.
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Current password is incorrect")]
    BadCredential,
    #[error("{0} is already taken")]
    Conflict(IdentityField),
    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Log the underlying failure and return an opaque internal error.
    pub fn internal(context: &str, e: impl std::fmt::Display) -> Self {
        tracing::error!(error = %e, "{}", context);
        Self::Internal(context.to_string())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::MissingCredential
            | AuthError::TokenInvalidated
            | AuthError::AccountUnavailable
            | AuthError::InvalidCredentials => ErrorKind::Unauthorized,
            AuthError::InvalidToken => ErrorKind::Invalid,
            AuthError::AccessExpired | AuthError::RefreshExpired => ErrorKind::Expired,
            AuthError::BadCredential => ErrorKind::BadCredential,
            AuthError::Conflict(_) => ErrorKind::Conflict,
            AuthError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Stable machine-readable code, if the client is expected to act on it.
    pub fn code(&self) -> Option<&'static str> {
        match self {
            AuthError::MissingCredential => Some("AUTH_REQUIRED"),
            AuthError::InvalidToken => Some("INVALID_TOKEN"),
            AuthError::AccessExpired => Some("TOKEN_EXPIRED"),
            AuthError::RefreshExpired => Some("REFRESH_EXPIRED"),
            AuthError::TokenInvalidated => Some("TOKEN_INVALIDATED"),
            _ => None,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Unauthorized | ErrorKind::Expired | ErrorKind::Invalid => {
                StatusCode::UNAUTHORIZED
            }
            ErrorKind::BadCredential => StatusCode::BAD_REQUEST,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            AuthError::Conflict(IdentityField::Username) => "Username already taken".into(),
            AuthError::Conflict(IdentityField::Email) => "Email already registered".into(),
            AuthError::Internal(_) => "Internal server error".into(),
            other => other.to_string(),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (
            self.status_code(),
            Json(ErrorResponse {
                error: self.message(),
                code: self.code(),
            }),
        )
            .into_response()
    }
}
