mod user;
mod vehicle;

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

pub use user::{User, UserRole, UserStore};
pub use vehicle::{NewVehicle, Vehicle, VehicleStore, VehicleUpdate};

/// Pool size; requests beyond it wait for a free connection.
pub const MAX_CONNECTIONS: u32 = 5;

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

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
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
                "CREATE TABLE users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT UNIQUE NOT NULL,
                    email TEXT UNIQUE NOT NULL COLLATE NOCASE,
                    password_hash TEXT NOT NULL,
                    role TEXT NOT NULL DEFAULT 'user',
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_users_uuid ON users(uuid)",
                "CREATE INDEX idx_users_email ON users(email)",
                "CREATE TABLE vehicles (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT UNIQUE NOT NULL,
                    make TEXT NOT NULL,
                    model TEXT NOT NULL,
                    year INTEGER NOT NULL,
                    vehicle_type TEXT NOT NULL,
                    price_per_day REAL NOT NULL,
                    is_available INTEGER NOT NULL DEFAULT 1,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_vehicles_uuid ON vehicles(uuid)",
            ],
        )
        .await
    }

    /// Get the user store.
    pub fn users(&self) -> UserStore {
        UserStore::new(self.pool.clone())
    }

    /// Get the vehicle store.
    pub fn vehicles(&self) -> VehicleStore {
        VehicleStore::new(self.pool.clone())
    }

    /// Get the underlying connection pool (for tests that need raw SQL access).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_get_user() {
        let db = Database::open(":memory:").await.unwrap();

        let id = db
            .users()
            .create("uuid-123", "alice@example.com", "hash", UserRole::User)
            .await
            .unwrap();

        let user = db
            .users()
            .get_by_email("alice@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.uuid, "uuid-123");
        assert_eq!(user.password_hash, "hash");
        assert_eq!(user.role, UserRole::User);
    }

    #[tokio::test]
    async fn test_email_lookup_ignores_case() {
        let db = Database::open(":memory:").await.unwrap();

        db.users()
            .create("uuid-1", "alice@example.com", "hash", UserRole::User)
            .await
            .unwrap();

        let user = db.users().get_by_email("Alice@Example.com").await.unwrap();
        assert!(user.is_some());
    }

    #[tokio::test]
    async fn test_duplicate_email_fails() {
        let db = Database::open(":memory:").await.unwrap();

        db.users()
            .create("uuid-1", "alice@example.com", "hash", UserRole::User)
            .await
            .unwrap();
        let result = db
            .users()
            .create("uuid-2", "alice@example.com", "hash", UserRole::Admin)
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_email_availability() {
        let db = Database::open(":memory:").await.unwrap();

        assert!(db.users().is_email_available("alice@example.com").await.unwrap());

        db.users()
            .create("uuid-1", "alice@example.com", "hash", UserRole::User)
            .await
            .unwrap();
        assert!(!db.users().is_email_available("alice@example.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_migration_is_idempotent() {
        let db = Database::open(":memory:").await.unwrap();
        db.migrate().await.unwrap();
        assert_eq!(db.get_version().await.unwrap(), 1);
    }
}
