use sqlx::sqlite::SqlitePool;

/// Credential store backed by the `users` table.
#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

/// User role for authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Admin => "admin",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "admin" => UserRole::Admin,
            _ => UserRole::User,
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub uuid: String,
    pub email: String,
    /// bcrypt hash, never serialized
    pub password_hash: String,
    pub role: UserRole,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    uuid: String,
    email: String,
    password_hash: String,
    role: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            uuid: row.uuid,
            email: row.email,
            password_hash: row.password_hash,
            role: UserRole::from_str(&row.role),
        }
    }
}

impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a user. Returns the user ID.
    pub async fn create(
        &self,
        uuid: &str,
        email: &str,
        password_hash: &str,
        role: UserRole,
    ) -> Result<i64, sqlx::Error> {
        let result =
            sqlx::query("INSERT INTO users (uuid, email, password_hash, role) VALUES (?, ?, ?, ?)")
                .bind(uuid)
                .bind(email)
                .bind(password_hash)
                .bind(role.as_str())
                .execute(&self.pool)
                .await?;
        Ok(result.last_insert_rowid())
    }

    /// Get a user by email (case-insensitive).
    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, uuid, email, password_hash, role FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    /// Check if an email is not yet registered.
    pub async fn is_email_available(&self, email: &str) -> Result<bool, sqlx::Error> {
        let count: (i32,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE email = ?")
            .bind(email)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0 == 0)
    }
}
