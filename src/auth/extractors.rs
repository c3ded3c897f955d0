//! Axum extractor guarding protected routes.

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header, request::Parts},
};

use super::errors::AuthError;
use super::state::HasAuthBackend;
use super::types::AuthenticatedAccount;
use crate::jwt::{JwtError, TokenType};

/// Extractor for endpoints that require a valid access token.
///
/// Verifies signature and expiry, requires an access-type token, loads the
/// active account and compares token versions. Rejects with the matching
/// [`AuthError`] otherwise.
pub struct Auth(pub AuthenticatedAccount);

impl<S> FromRequestParts<S> for Auth
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(cached) = parts.extensions.get::<AuthenticatedAccount>() {
            return Ok(Auth(cached.clone()));
        }

        let authenticated = authenticate(&parts.headers, state).await?;
        parts.extensions.insert(authenticated.clone());
        Ok(Auth(authenticated))
    }
}

async fn authenticate<S>(headers: &HeaderMap, state: &S) -> Result<AuthenticatedAccount, AuthError>
where
    S: HasAuthBackend + Send + Sync,
{
    let token = bearer_token(headers)?;

    let claims = state.jwt().verify(token).map_err(|e| match e {
        JwtError::Expired => AuthError::AccessExpired,
        _ => AuthError::InvalidToken,
    })?;

    if claims.token_type != TokenType::Access {
        return Err(AuthError::InvalidToken);
    }

    let account = state
        .db()
        .accounts()
        .get_active_by_id(&claims.sub)
        .await
        .map_err(|e| AuthError::internal("Failed to load account", e))?
        .ok_or(AuthError::AccountUnavailable)?;

    if claims.token_version != account.token_version {
        return Err(AuthError::TokenInvalidated);
    }

    Ok(AuthenticatedAccount {
        account,
        token: token.to_string(),
        claims,
    })
}

/// Parse `Authorization: Bearer <token>`.
fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingCredential)?
        .to_str()
        .map_err(|_| AuthError::InvalidToken)?;

    match value.strip_prefix("Bearer ") {
        Some(token) if !token.is_empty() && !token.contains(char::is_whitespace) => Ok(token),
        _ => Err(AuthError::InvalidToken),
    }
}
