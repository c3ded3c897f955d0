//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::db::Database;
use crate::password::{HashCost, PasswordHasher};
use clap::Parser;
use tracing::{error, info, warn};

const MIN_JWT_SECRET_LENGTH: usize = 32;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "cardkeep", about = "Game card catalog with token-based accounts")]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "3000")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, env = "DATABASE_PATH", default_value = "cardkeep.db")]
    pub database: String,

    /// Path to file containing JWT secret. Prefer using JWT_SECRET env var instead
    #[arg(long)]
    pub jwt_secret_file: Option<String>,

    /// Set the Secure flag on the refresh cookie (enable behind HTTPS)
    #[arg(long, env = "SECURE_COOKIES")]
    pub secure_cookies: bool,

    /// Take the client IP from X-Forwarded-For (only behind a trusted proxy)
    #[arg(long)]
    pub trust_proxy: bool,

    /// Disable per-IP rate limiting on register and login
    #[arg(long)]
    pub no_rate_limit: bool,

    /// Argon2 memory cost in KiB
    #[arg(long, default_value_t = HashCost::default().memory_kib)]
    pub hash_memory_kib: u32,

    /// Argon2 iterations
    #[arg(long, default_value_t = HashCost::default().iterations)]
    pub hash_iterations: u32,

    /// Deactivate the account with this email and exit
    #[arg(long, value_name = "EMAIL")]
    pub deactivate: Option<String>,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load JWT secret from environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_jwt_secret(jwt_secret_file: Option<&str>) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var("JWT_SECRET") {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var("JWT_SECRET") };
        secret
    } else if let Some(path) = jwt_secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read JWT secret file");
                return None;
            }
        }
    } else {
        error!(
            "JWT secret is required. Set JWT_SECRET environment variable (recommended) or use --jwt-secret-file"
        );
        return None;
    };

    validate_jwt_secret(secret)
}

fn validate_jwt_secret(secret: String) -> Option<String> {
    if secret.len() < MIN_JWT_SECRET_LENGTH {
        error!(
            "JWT secret is shorter than {} characters. Use a longer secret",
            MIN_JWT_SECRET_LENGTH
        );
        return None;
    }
    Some(secret)
}

/// Handle the --deactivate flag: soft-deactivate an account by email.
/// Returns false if the account does not exist or the update failed.
pub async fn handle_deactivate(db: &Database, email: &str) -> bool {
    match db.accounts().set_active_by_email(email, false).await {
        Ok(true) => {
            info!(email = %email, "Account deactivated");
            true
        }
        Ok(false) => {
            warn!(email = %email, "No account with this email");
            false
        }
        Err(e) => {
            error!(email = %email, error = %e, "Failed to deactivate account");
            false
        }
    }
}

/// Build ServerConfig from validated arguments.
/// Returns None and logs an error if the hash parameters are rejected.
pub fn build_config(args: &Args, db: Database, jwt_secret: String) -> Option<ServerConfig> {
    let cost = HashCost {
        memory_kib: args.hash_memory_kib,
        iterations: args.hash_iterations,
    };
    let password_hasher = match PasswordHasher::new(cost) {
        Ok(hasher) => hasher,
        Err(e) => {
            error!(error = %e, "Invalid password hashing parameters");
            return None;
        }
    };

    if !args.secure_cookies {
        warn!("Refresh cookie is sent without the Secure flag");
    }

    Some(ServerConfig {
        db,
        jwt_secret: jwt_secret.into_bytes(),
        secure_cookies: args.secure_cookies,
        password_hasher,
        rate_limit: !args.no_rate_limit,
        trust_proxy: args.trust_proxy,
    })
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_secret_rejected() {
        assert!(validate_jwt_secret("too-short".into()).is_none());
        let long = "x".repeat(MIN_JWT_SECRET_LENGTH);
        assert_eq!(validate_jwt_secret(long.clone()), Some(long));
    }

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["cardkeep"]).unwrap();
        assert_eq!(args.port, 3000);
        assert_eq!(args.database, "cardkeep.db");
        assert_eq!(args.hash_memory_kib, 19 * 1024);
        assert_eq!(args.hash_iterations, 2);
        assert!(!args.no_rate_limit);
        assert!(args.deactivate.is_none());
    }

    #[tokio::test]
    async fn test_build_config_rejects_bad_cost() {
        let db = Database::open(":memory:").await.unwrap();
        let args = Args::try_parse_from(["cardkeep", "--hash-iterations", "0"]).unwrap();
        assert!(build_config(&args, db, "x".repeat(32)).is_none());
    }

    #[tokio::test]
    async fn test_deactivate() {
        let db = Database::open(":memory:").await.unwrap();
        assert!(!handle_deactivate(&db, "nobody@x.com").await);
    }
}
