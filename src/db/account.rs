//! Account storage: credentials, token versions, profile.
//!
//! The password hash never leaves this module except through the
//! crate-private credential lookups used by the session layer.

use serde::Serialize;
use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct AccountStore {
    pool: SqlitePool,
}

/// Which unique identity column a write collided on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityField {
    Username,
    Email,
}

impl IdentityField {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityField::Username => "username",
            IdentityField::Email => "email",
        }
    }
}

impl std::fmt::Display for IdentityField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("{0} is already taken")]
    Taken(IdentityField),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Fields required to create an account.
#[derive(Debug, Clone, Copy)]
pub struct NewAccount<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Profile {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameStats {
    pub games_played: i64,
    pub games_won: i64,
    pub total_score: i64,
    pub level: i64,
}

impl GameStats {
    /// Percentage of games won, rounded to two decimals.
    pub fn win_rate(&self) -> f64 {
        if self.games_played == 0 {
            return 0.0;
        }
        let rate = self.games_won as f64 / self.games_played as f64 * 100.0;
        (rate * 100.0).round() / 100.0
    }
}

/// Partial profile update. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Account {
    pub id: String,
    pub username: String,
    pub email: String,
    pub token_version: i64,
    pub is_active: bool,
    pub last_login: Option<String>,
    pub profile: Profile,
    pub game_stats: GameStats,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(sqlx::FromRow)]
struct AccountRow {
    id: String,
    username: String,
    email: String,
    token_version: i64,
    is_active: bool,
    last_login: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    avatar: Option<String>,
    bio: Option<String>,
    games_played: i64,
    games_won: i64,
    total_score: i64,
    level: i64,
    created_at: String,
    updated_at: String,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            email: row.email,
            token_version: row.token_version,
            is_active: row.is_active,
            last_login: row.last_login,
            profile: Profile {
                first_name: row.first_name,
                last_name: row.last_name,
                avatar: row.avatar,
                bio: row.bio,
            },
            game_stats: GameStats {
                games_played: row.games_played,
                games_won: row.games_won,
                total_score: row.total_score,
                level: row.level,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CredentialRow {
    #[sqlx(flatten)]
    account: AccountRow,
    password_hash: String,
}

/// Lower-case and trim an email address for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Map a unique-constraint violation to the column it hit.
fn taken_field(e: &sqlx::Error) -> Option<IdentityField> {
    let db_err = e.as_database_error()?;
    if !db_err.is_unique_violation() {
        return None;
    }
    let message = db_err.message();
    if message.contains("accounts.email") {
        Some(IdentityField::Email)
    } else if message.contains("accounts.username") {
        Some(IdentityField::Username)
    } else {
        None
    }
}

impl AccountStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create an active account at token version 0.
    pub async fn create(&self, new: NewAccount<'_>) -> Result<Account, AccountError> {
        let username = new.username.trim();
        let email = normalize_email(new.email);

        if let Some(field) = self.identity_taken(username, &email).await? {
            return Err(AccountError::Taken(field));
        }

        let id = uuid::Uuid::new_v4().to_string();

        // The pre-check can race another registration; the unique indexes decide
        sqlx::query("INSERT INTO accounts (id, username, email, password_hash) VALUES (?, ?, ?, ?)")
            .bind(&id)
            .bind(username)
            .bind(&email)
            .bind(new.password_hash)
            .execute(&self.pool)
            .await
            .map_err(|e| match taken_field(&e) {
                Some(field) => AccountError::Taken(field),
                None => AccountError::Database(e),
            })?;

        self.get_by_id(&id)
            .await?
            .ok_or(AccountError::Database(sqlx::Error::RowNotFound))
    }

    /// Report the first identity column already in use, if any.
    pub async fn identity_taken(
        &self,
        username: &str,
        email: &str,
    ) -> Result<Option<IdentityField>, sqlx::Error> {
        let email_count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM accounts WHERE email = ?")
            .bind(normalize_email(email))
            .fetch_one(&self.pool)
            .await?;
        if email_count.0 > 0 {
            return Ok(Some(IdentityField::Email));
        }

        let username_count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM accounts WHERE username = ?")
                .bind(username.trim())
                .fetch_one(&self.pool)
                .await?;
        if username_count.0 > 0 {
            return Ok(Some(IdentityField::Username));
        }

        Ok(None)
    }

    /// Get an account by id, active or not.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<Account>, sqlx::Error> {
        let row: Option<AccountRow> = sqlx::query_as(
            "SELECT id, username, email, token_version, is_active, last_login,
                    first_name, last_name, avatar, bio,
                    games_played, games_won, total_score, level, created_at, updated_at
             FROM accounts WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Account::from))
    }

    /// Get an account by id only if it is active.
    pub async fn get_active_by_id(&self, id: &str) -> Result<Option<Account>, sqlx::Error> {
        let row: Option<AccountRow> = sqlx::query_as(
            "SELECT id, username, email, token_version, is_active, last_login,
                    first_name, last_name, avatar, bio,
                    games_played, games_won, total_score, level, created_at, updated_at
             FROM accounts WHERE id = ? AND is_active = 1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Account::from))
    }

    /// Look up an active account by email together with its password hash.
    pub(crate) async fn get_active_credentials_by_email(
        &self,
        email: &str,
    ) -> Result<Option<(Account, String)>, sqlx::Error> {
        let row: Option<CredentialRow> = sqlx::query_as(
            "SELECT id, username, email, token_version, is_active, last_login,
                    first_name, last_name, avatar, bio,
                    games_played, games_won, total_score, level, created_at, updated_at,
                    password_hash
             FROM accounts WHERE email = ? AND is_active = 1",
        )
        .bind(normalize_email(email))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| (Account::from(r.account), r.password_hash)))
    }

    /// Get the password hash of an account.
    pub(crate) async fn get_password_hash(&self, id: &str) -> Result<Option<String>, sqlx::Error> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT password_hash FROM accounts WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|r| r.0))
    }

    /// Record a successful login.
    pub async fn touch_last_login(&self, id: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE accounts SET last_login = datetime('now') WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Atomically bump the token version. Returns the new version, or None
    /// if the account does not exist.
    pub async fn increment_token_version(&self, id: &str) -> Result<Option<i64>, sqlx::Error> {
        let row: Option<(i64,)> = sqlx::query_as(
            "UPDATE accounts SET token_version = token_version + 1, updated_at = datetime('now')
             WHERE id = ? RETURNING token_version",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| r.0))
    }

    /// Bump the token version only if it still equals `expected`.
    /// Returns false when another writer got there first.
    pub async fn rotate_token_version(&self, id: &str, expected: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE accounts SET token_version = token_version + 1, updated_at = datetime('now')
             WHERE id = ? AND token_version = ? AND is_active = 1",
        )
        .bind(id)
        .bind(expected)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Apply a partial profile update and return the stored account.
    pub async fn update_profile(
        &self,
        id: &str,
        update: &ProfileUpdate,
    ) -> Result<Account, AccountError> {
        let username = update.username.as_deref().map(str::trim);

        sqlx::query(
            "UPDATE accounts SET
                username = COALESCE(?, username),
                first_name = COALESCE(?, first_name),
                last_name = COALESCE(?, last_name),
                avatar = COALESCE(?, avatar),
                bio = COALESCE(?, bio),
                updated_at = datetime('now')
             WHERE id = ?",
        )
        .bind(username)
        .bind(update.first_name.as_deref())
        .bind(update.last_name.as_deref())
        .bind(update.avatar.as_deref())
        .bind(update.bio.as_deref())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| match taken_field(&e) {
            Some(field) => AccountError::Taken(field),
            None => AccountError::Database(e),
        })?;

        self.get_by_id(id)
            .await?
            .ok_or(AccountError::Database(sqlx::Error::RowNotFound))
    }

    /// Replace the password hash.
    pub async fn set_password_hash(
        &self,
        id: &str,
        password_hash: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE accounts SET password_hash = ?, updated_at = datetime('now') WHERE id = ?",
        )
        .bind(password_hash)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Activate or deactivate an account.
    pub async fn set_active(&self, id: &str, active: bool) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE accounts SET is_active = ?, updated_at = datetime('now') WHERE id = ?",
        )
        .bind(active)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Activate or deactivate an account by email.
    pub async fn set_active_by_email(
        &self,
        email: &str,
        active: bool,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE accounts SET is_active = ?, updated_at = datetime('now') WHERE email = ?",
        )
        .bind(active)
        .bind(normalize_email(email))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Alice@X.COM "), "alice@x.com");
    }

    #[test]
    fn test_win_rate() {
        let mut stats = GameStats {
            games_played: 0,
            games_won: 0,
            total_score: 0,
            level: 1,
        };
        assert_eq!(stats.win_rate(), 0.0);

        stats.games_played = 3;
        stats.games_won = 2;
        assert_eq!(stats.win_rate(), 66.67);
    }
}
