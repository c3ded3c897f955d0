mod account;
mod card;

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

pub use account::{
    Account, AccountStore, AccountError, GameStats, IdentityField, NewAccount, Profile,
    ProfileUpdate,
};
pub use card::{
    Card, CardError, CardFilter, CardIcon, CardPage, CardStats, CardStore, CardType, CardUpdate,
    CatalogStats, NewCard, Skill, TypeCount,
};

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open or create a database at the given path.
    /// Use ":memory:" for an in-memory database.
    pub async fn open(path: &str) -> Result<Self, sqlx::Error> {
        let url = if path == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite:{}?mode=rwc", path)
        };

        // In-memory databases use a shared cache, where concurrent writers fail
        // with SQLITE_LOCKED instead of waiting on the busy timeout
        let max_connections = if path == ":memory:" { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(&url)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Get the current schema version.
    async fn get_version(&self) -> Result<i32, sqlx::Error> {
        let result: Option<(i32,)> = sqlx::query_as("SELECT version FROM schema_version LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(result.map(|r| r.0).unwrap_or(0))
    }

    /// Set the schema version within a transaction.
    async fn set_version(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        version: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM schema_version")
            .execute(&mut **tx)
            .await?;
        sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
            .bind(version)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Run database migrations.
    async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::query("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
            .execute(&self.pool)
            .await?;

        let version = self.get_version().await?;

        if version < 1 {
            self.migrate_v1().await?;
        }

        if version < 2 {
            self.migrate_v2().await?;
        }

        Ok(())
    }

    /// Execute a list of queries in a transaction, then set the version.
    async fn run_migration(
        &self,
        version: i32,
        queries: &[&'static str],
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for query in queries {
            sqlx::query(*query).execute(&mut *tx).await?;
        }
        Self::set_version(&mut tx, version).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn migrate_v1(&self) -> Result<(), sqlx::Error> {
        self.run_migration(
            1,
            &[
                "CREATE TABLE accounts (
                    id TEXT PRIMARY KEY NOT NULL,
                    username TEXT UNIQUE NOT NULL COLLATE NOCASE,
                    email TEXT UNIQUE NOT NULL,
                    password_hash TEXT NOT NULL,
                    token_version INTEGER NOT NULL DEFAULT 0,
                    is_active INTEGER NOT NULL DEFAULT 1,
                    last_login TEXT,
                    first_name TEXT,
                    last_name TEXT,
                    avatar TEXT,
                    bio TEXT,
                    games_played INTEGER NOT NULL DEFAULT 0,
                    games_won INTEGER NOT NULL DEFAULT 0,
                    total_score INTEGER NOT NULL DEFAULT 0,
                    level INTEGER NOT NULL DEFAULT 1,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_accounts_email_active ON accounts(email, is_active)",
                "CREATE INDEX idx_accounts_username_active ON accounts(username, is_active)",
            ],
        )
        .await
    }

    async fn migrate_v2(&self) -> Result<(), sqlx::Error> {
        self.run_migration(
            2,
            &[
                "CREATE TABLE cards (
                    id TEXT PRIMARY KEY NOT NULL,
                    name TEXT NOT NULL,
                    card_type TEXT NOT NULL,
                    origin TEXT NOT NULL,
                    dna_rate INTEGER NOT NULL,
                    icon_1 TEXT NOT NULL,
                    icon_2 TEXT NOT NULL,
                    icon_3 TEXT NOT NULL,
                    attack INTEGER NOT NULL,
                    defense INTEGER NOT NULL,
                    mana INTEGER NOT NULL,
                    skills TEXT NOT NULL DEFAULT '[]',
                    lore TEXT NOT NULL,
                    image_url TEXT NOT NULL DEFAULT '/images/default.svg',
                    release_date TEXT NOT NULL DEFAULT (datetime('now')),
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_cards_type ON cards(card_type)",
                "CREATE INDEX idx_cards_dna_rate ON cards(dna_rate)",
                "CREATE INDEX idx_cards_attack ON cards(attack)",
                "CREATE INDEX idx_cards_created_at ON cards(created_at)",
            ],
        )
        .await
    }

    /// Get the account store.
    pub fn accounts(&self) -> AccountStore {
        AccountStore::new(self.pool.clone())
    }

    /// Get the card store.
    pub fn cards(&self) -> CardStore {
        CardStore::new(self.pool.clone())
    }
}
