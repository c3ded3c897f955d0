//! Session lifecycle: register, login, logout, refresh, profile and password.
//!
//! Every operation is a bounded round trip against the account store. Token
//! version writes are single conditional statements, so concurrent refreshes
//! of the same token cannot both succeed.

use std::sync::Arc;

use tracing::{info, warn};

use crate::auth::AuthError;
use crate::db::{Account, AccountError, Database, NewAccount, ProfileUpdate};
use crate::jwt::{JwtConfig, JwtError, TokenPair, TokenType};
use crate::password::PasswordHasher;

/// An account together with a freshly issued token pair.
#[derive(Debug, Clone)]
pub struct Session {
    pub account: Account,
    pub tokens: TokenPair,
}

#[derive(Clone)]
pub struct SessionAuthority {
    db: Database,
    jwt: Arc<JwtConfig>,
    hasher: Arc<PasswordHasher>,
}

impl SessionAuthority {
    pub fn new(db: Database, jwt: Arc<JwtConfig>, hasher: Arc<PasswordHasher>) -> Self {
        Self { db, jwt, hasher }
    }

    /// Create an account at token version 0 and issue its first pair.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        // Checked before hashing so a duplicate does not cost a hash
        if let Some(field) = self
            .db
            .accounts()
            .identity_taken(username, email)
            .await
            .map_err(|e| AuthError::internal("Failed to check identity", e))?
        {
            return Err(AuthError::Conflict(field));
        }

        let password_hash = self.hash(password).await?;

        let account = self
            .db
            .accounts()
            .create(NewAccount {
                username,
                email,
                password_hash: &password_hash,
            })
            .await
            .map_err(|e| match e {
                AccountError::Taken(field) => AuthError::Conflict(field),
                AccountError::Database(e) => AuthError::internal("Failed to create account", e),
            })?;

        let tokens = self.issue(&account)?;
        info!(account_id = %account.id, username = %account.username, "Account registered");

        Ok(Session { account, tokens })
    }

    /// Authenticate by email and password.
    ///
    /// Unknown email, inactive account and wrong password all fail with the
    /// same `InvalidCredentials` error.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let Some((mut account, digest)) = self
            .db
            .accounts()
            .get_active_credentials_by_email(email)
            .await
            .map_err(|e| AuthError::internal("Failed to load credentials", e))?
        else {
            // Same hashing work as a wrong password
            self.verify(password, self.hasher.decoy_digest().to_string()).await?;
            warn!("Login failed: unknown or inactive account");
            return Err(AuthError::InvalidCredentials);
        };

        if !self.verify(password, digest).await? {
            warn!(account_id = %account.id, "Login failed: wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        self.db
            .accounts()
            .touch_last_login(&account.id)
            .await
            .map_err(|e| AuthError::internal("Failed to update last login", e))?;
        if let Some(updated) = self
            .db
            .accounts()
            .get_by_id(&account.id)
            .await
            .map_err(|e| AuthError::internal("Failed to load account", e))?
        {
            account = updated;
        }

        let tokens = self.issue(&account)?;
        info!(account_id = %account.id, "Login");

        Ok(Session { account, tokens })
    }

    /// Invalidate every outstanding token for the account.
    /// Returns the new token version.
    pub async fn logout(&self, account: &Account) -> Result<i64, AuthError> {
        let version = self.bump_version(account).await?;
        info!(account_id = %account.id, token_version = version, "Logout");
        Ok(version)
    }

    /// Same effect as [`logout`](Self::logout): all sessions share one version.
    pub async fn logout_all_devices(&self, account: &Account) -> Result<i64, AuthError> {
        let version = self.bump_version(account).await?;
        info!(account_id = %account.id, token_version = version, "Logout from all devices");
        Ok(version)
    }

    /// Exchange a refresh token for a new pair, rotating the token version.
    ///
    /// The presented token is single-use: the rotation is a conditional
    /// write on the version it carries, so a replay or a concurrent second
    /// use fails with `TokenInvalidated`.
    pub async fn refresh(&self, refresh_token: Option<&str>) -> Result<Session, AuthError> {
        let token = refresh_token.ok_or(AuthError::MissingCredential)?;

        let claims = self.jwt.verify(token).map_err(|e| match e {
            JwtError::Expired => AuthError::RefreshExpired,
            _ => AuthError::InvalidToken,
        })?;

        if claims.token_type != TokenType::Refresh {
            return Err(AuthError::InvalidToken);
        }

        let mut account = self
            .db
            .accounts()
            .get_active_by_id(&claims.sub)
            .await
            .map_err(|e| AuthError::internal("Failed to load account", e))?
            .ok_or(AuthError::AccountUnavailable)?;

        if claims.token_version != account.token_version {
            warn!(
                account_id = %account.id,
                presented = claims.token_version,
                current = account.token_version,
                "Refresh token reused after invalidation"
            );
            return Err(AuthError::TokenInvalidated);
        }

        let rotated = self
            .db
            .accounts()
            .rotate_token_version(&account.id, claims.token_version)
            .await
            .map_err(|e| AuthError::internal("Failed to rotate token version", e))?;
        if !rotated {
            warn!(account_id = %account.id, "Concurrent refresh lost the rotation");
            return Err(AuthError::TokenInvalidated);
        }

        account.token_version = claims.token_version + 1;
        let tokens = self.issue(&account)?;
        info!(account_id = %account.id, token_version = account.token_version, "Token refreshed");

        Ok(Session { account, tokens })
    }

    /// Current state of an active account.
    pub async fn profile(&self, account_id: &str) -> Result<Account, AuthError> {
        self.db
            .accounts()
            .get_active_by_id(account_id)
            .await
            .map_err(|e| AuthError::internal("Failed to load account", e))?
            .ok_or(AuthError::AccountUnavailable)
    }

    /// Merge profile fields and optionally rename the account.
    pub async fn update_profile(
        &self,
        account_id: &str,
        update: &ProfileUpdate,
    ) -> Result<Account, AuthError> {
        self.db
            .accounts()
            .update_profile(account_id, update)
            .await
            .map_err(|e| match e {
                AccountError::Taken(field) => AuthError::Conflict(field),
                AccountError::Database(sqlx::Error::RowNotFound) => AuthError::AccountUnavailable,
                AccountError::Database(e) => AuthError::internal("Failed to update profile", e),
            })
    }

    /// Replace the password after re-verifying the current one.
    pub async fn change_password(
        &self,
        account_id: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let digest = self
            .db
            .accounts()
            .get_password_hash(account_id)
            .await
            .map_err(|e| AuthError::internal("Failed to load password hash", e))?
            .ok_or(AuthError::AccountUnavailable)?;

        if !self.verify(current_password, digest).await? {
            warn!(account_id = %account_id, "Password change rejected: wrong current password");
            return Err(AuthError::BadCredential);
        }

        let new_hash = self.hash(new_password).await?;
        let updated = self
            .db
            .accounts()
            .set_password_hash(account_id, &new_hash)
            .await
            .map_err(|e| AuthError::internal("Failed to store password hash", e))?;
        if !updated {
            return Err(AuthError::AccountUnavailable);
        }

        info!(account_id = %account_id, "Password changed");
        Ok(())
    }

    async fn bump_version(&self, account: &Account) -> Result<i64, AuthError> {
        self.db
            .accounts()
            .increment_token_version(&account.id)
            .await
            .map_err(|e| AuthError::internal("Failed to increment token version", e))?
            .ok_or(AuthError::AccountUnavailable)
    }

    fn issue(&self, account: &Account) -> Result<TokenPair, AuthError> {
        self.jwt
            .issue_pair(&account.id, account.token_version)
            .map_err(|e| AuthError::internal("Failed to issue tokens", e))
    }

    async fn hash(&self, password: &str) -> Result<String, AuthError> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AuthError::internal("Hashing task failed", e))?
            .map_err(|e| AuthError::internal("Failed to hash password", e))
    }

    async fn verify(&self, password: &str, digest: String) -> Result<bool, AuthError> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &digest))
            .await
            .map_err(|e| AuthError::internal("Verification task failed", e))
    }
}
