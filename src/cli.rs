//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::api::{normalize_email, validate_email};
use crate::db::{Database, NewVehicle, UserRole};
use crate::password::{DEFAULT_COST, PasswordError, hash_password};
use axum::http::HeaderValue;
use clap::Parser;
use rand::{Rng, distr::Alphanumeric};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

const MIN_SECRET_LENGTH: usize = 32;
const GENERATED_PASSWORD_LENGTH: usize = 24;

pub const ACCESS_SECRET_ENV: &str = "ACCESS_TOKEN_SECRET";
pub const REFRESH_SECRET_ENV: &str = "REFRESH_TOKEN_SECRET";

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "Propelize", about = "Vehicle rental catalog API with JWT authentication")]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "3000")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, default_value = "propelize.db")]
    pub database: String,

    /// File containing the access token secret. Prefer the ACCESS_TOKEN_SECRET env var
    #[arg(long)]
    pub access_token_secret_file: Option<String>,

    /// File containing the refresh token secret. Prefer the REFRESH_TOKEN_SECRET env var
    #[arg(long)]
    pub refresh_token_secret_file: Option<String>,

    /// Omit the Secure cookie attribute (plain HTTP local development only)
    #[arg(long)]
    pub insecure_cookies: bool,

    /// Timeout for the credential store lookup at login, in milliseconds
    #[arg(long, default_value = "5000")]
    pub store_timeout_ms: u64,

    /// Login and registration attempts allowed per minute and client IP
    #[arg(long, default_value = "10")]
    pub login_attempts_per_minute: u32,

    /// bcrypt cost for new password hashes
    #[arg(long, default_value_t = DEFAULT_COST, value_parser = clap::value_parser!(u32).range(4..=31))]
    pub bcrypt_cost: u32,

    /// Create an admin account with this email on startup and print its generated password
    #[arg(long, value_name = "EMAIL")]
    pub create_admin: Option<String>,

    /// Origin allowed to call the API with cookies (repeatable). Without it any origin may call, without credentials
    #[arg(long = "cors-origin", value_name = "ORIGIN", value_parser = parse_origin)]
    pub cors_origins: Vec<HeaderValue>,

    /// Insert the demo vehicle catalog if the catalog is empty
    #[arg(long)]
    pub seed: bool,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

fn parse_origin(origin: &str) -> Result<HeaderValue, String> {
    let origin = origin.trim_end_matches('/');
    if !(origin.starts_with("http://") || origin.starts_with("https://")) {
        return Err(format!("origin must start with http:// or https://: {}", origin));
    }
    HeaderValue::from_str(origin).map_err(|e| e.to_string())
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load a signing secret from an environment variable or a file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_secret(env_var: &str, secret_file: Option<&str>) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var(env_var) {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var(env_var) };
        secret
    } else if let Some(path) = secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read secret file");
                return None;
            }
        }
    } else {
        error!(
            env = %env_var,
            "Signing secret is required. Set the environment variable (recommended) or pass the secret file option"
        );
        return None;
    };

    if secret.len() < MIN_SECRET_LENGTH {
        error!(
            env = %env_var,
            "Secret is shorter than {} characters. Use a longer secret",
            MIN_SECRET_LENGTH
        );
        return None;
    }

    Some(secret)
}

fn generate_password() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_PASSWORD_LENGTH)
        .map(char::from)
        .collect()
}

#[derive(Debug, Error)]
pub enum CreateAdminError {
    #[error("admin email is not a valid address: {0}")]
    InvalidEmail(String),
    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),
    #[error("failed to hash admin password: {0}")]
    Hash(#[from] PasswordError),
}

/// Create an admin with a generated password and return that password.
/// Returns None when the email is already registered.
pub async fn create_admin(
    db: &Database,
    email: &str,
    bcrypt_cost: u32,
) -> Result<Option<String>, CreateAdminError> {
    let email = normalize_email(email);
    validate_email(&email).map_err(|_| CreateAdminError::InvalidEmail(email.clone()))?;

    if !db.users().is_email_available(&email).await? {
        return Ok(None);
    }

    let password = generate_password();
    let hash = hash_password(password.clone(), bcrypt_cost).await?;
    let uuid = Uuid::new_v4().to_string();
    db.users()
        .create(&uuid, &email, &hash, UserRole::Admin)
        .await?;

    Ok(Some(password))
}

/// Handle the --create-admin flag. Exits the process on failure.
pub async fn handle_create_admin(db: &Database, email: &str, bcrypt_cost: u32) {
    match create_admin(db, email, bcrypt_cost).await {
        Ok(Some(password)) => {
            println!();
            println!("Admin user created: {}", normalize_email(email));
            println!("Password: {}", password);
            println!();
        }
        Ok(None) => {
            warn!(email = %email, "Account already exists, admin not created");
        }
        Err(e) => {
            error!(error = %e, "Failed to create admin user");
            std::process::exit(1);
        }
    }
}

/// Vehicles inserted by `--seed`.
pub fn demo_catalog() -> Vec<NewVehicle> {
    [
        ("Toyota", "Corolla", 2022, "Sedan", 50.0),
        ("Ford", "F-150", 2021, "Truck", 80.0),
        ("Tesla", "Model 3", 2023, "Electric", 100.0),
    ]
    .into_iter()
    .map(|(make, model, year, vehicle_type, price_per_day)| NewVehicle {
        make: make.to_string(),
        model: model.to_string(),
        year,
        vehicle_type: vehicle_type.to_string(),
        price_per_day,
        is_available: true,
    })
    .collect()
}

/// Handle the --seed flag. Returns the number of vehicles inserted.
pub async fn handle_seed(db: &Database) -> Result<u64, sqlx::Error> {
    let vehicles = db.vehicles();
    if vehicles.count().await? > 0 {
        info!("Vehicle catalog not empty, skipping seed");
        return Ok(0);
    }

    let inserted = vehicles.create_many(&demo_catalog()).await?;
    info!(count = inserted, "Seeded vehicle catalog");
    Ok(inserted)
}

/// Build ServerConfig from validated arguments.
pub fn build_config(
    args: &Args,
    db: Database,
    access_token_secret: String,
    refresh_token_secret: String,
) -> ServerConfig {
    if args.insecure_cookies {
        warn!("Secure cookie attribute disabled; do not use outside local development");
    }

    ServerConfig {
        db,
        access_token_secret: access_token_secret.into_bytes(),
        refresh_token_secret: refresh_token_secret.into_bytes(),
        secure_cookies: !args.insecure_cookies,
        store_timeout: Duration::from_millis(args.store_timeout_ms),
        bcrypt_cost: args.bcrypt_cost,
        login_attempts_per_minute: args.login_attempts_per_minute,
        cors_origins: args.cors_origins.clone(),
    }
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
    fn test_default_args() {
        let args = Args::parse_from(["propelize"]);
        assert_eq!(args.database, "propelize.db");
        assert_eq!(args.store_timeout_ms, 5000);
        assert_eq!(args.login_attempts_per_minute, 10);
        assert_eq!(args.bcrypt_cost, DEFAULT_COST);
        assert!(!args.insecure_cookies);
        assert!(args.create_admin.is_none());
        assert!(args.cors_origins.is_empty());
    }

    #[test]
    fn test_cors_origin_args() {
        let args = Args::parse_from([
            "propelize",
            "--cors-origin",
            "https://app.propelize.com/",
            "--cors-origin",
            "http://localhost:5173",
        ]);
        assert_eq!(
            args.cors_origins,
            vec![
                HeaderValue::from_static("https://app.propelize.com"),
                HeaderValue::from_static("http://localhost:5173"),
            ]
        );

        assert!(Args::try_parse_from(["propelize", "--cors-origin", "app.propelize.com"]).is_err());
    }

    #[test]
    fn test_bcrypt_cost_range() {
        assert!(Args::try_parse_from(["propelize", "--bcrypt-cost", "3"]).is_err());
        assert!(Args::try_parse_from(["propelize", "--bcrypt-cost", "10"]).is_ok());
    }

    #[test]
    fn test_load_secret_from_file() {
        let path = std::env::temp_dir().join(format!("propelize-secret-{}", Uuid::new_v4()));
        std::fs::write(&path, "  0123456789abcdef0123456789abcdef\n").unwrap();

        let secret = load_secret("PROPELIZE_TEST_UNSET_SECRET", path.to_str());
        std::fs::remove_file(&path).ok();

        assert_eq!(secret.as_deref(), Some("0123456789abcdef0123456789abcdef"));
    }

    #[test]
    fn test_load_secret_too_short() {
        let path = std::env::temp_dir().join(format!("propelize-secret-{}", Uuid::new_v4()));
        std::fs::write(&path, "short").unwrap();

        let secret = load_secret("PROPELIZE_TEST_UNSET_SECRET", path.to_str());
        std::fs::remove_file(&path).ok();

        assert!(secret.is_none());
    }

    #[test]
    fn test_load_secret_missing() {
        assert!(load_secret("PROPELIZE_TEST_UNSET_SECRET", None).is_none());
    }

    #[test]
    fn test_generated_password() {
        let a = generate_password();
        let b = generate_password();
        assert_eq!(a.len(), GENERATED_PASSWORD_LENGTH);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_seed_only_when_empty() {
        let db = Database::open(":memory:").await.unwrap();

        assert_eq!(handle_seed(&db).await.unwrap(), 3);
        assert_eq!(handle_seed(&db).await.unwrap(), 0);
        assert_eq!(db.vehicles().count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_create_admin() {
        let db = Database::open(":memory:").await.unwrap();

        let password = create_admin(&db, " Admin@Propelize.com ", 4)
            .await
            .unwrap()
            .unwrap();

        let user = db
            .users()
            .get_by_email("admin@propelize.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.role, UserRole::Admin);
        assert!(
            crate::password::verify_password(password, user.password_hash)
                .await
                .unwrap()
        );

        // Second run leaves the existing account alone
        assert!(create_admin(&db, "admin@propelize.com", 4).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_admin_rejects_invalid_email() {
        let db = Database::open(":memory:").await.unwrap();

        for email in ["a@b@c", "admin@", "@propelize.com", "ad min@propelize.com", ""] {
            let err = create_admin(&db, email, 4).await.unwrap_err();
            assert!(
                matches!(err, CreateAdminError::InvalidEmail(_)),
                "email: {:?}",
                email
            );
        }
        assert!(db.users().is_email_available("a@b@c").await.unwrap());
    }
}
