#![allow(dead_code)]

use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Request, Response, header},
};
use propelize::{
    ServerConfig, create_app,
    db::{Database, UserRole},
    jwt::{Identity, JwtConfig},
    password::hash_password,
};

pub const ACCESS_SECRET: &[u8] = b"test-access-secret-0123456789abcdef";
pub const REFRESH_SECRET: &[u8] = b"test-refresh-secret-0123456789abcdef";

/// Lowest bcrypt cost, tests only.
pub const TEST_BCRYPT_COST: u32 = 4;

pub struct TestApp {
    pub router: Router,
    pub db: Database,
    /// Signs with the same secrets as the app, for minting tokens directly
    pub jwt: JwtConfig,
}

/// Settings used by `create_test_app`, for tests that tweak one field.
pub async fn test_config() -> ServerConfig {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    ServerConfig {
        db,
        access_token_secret: ACCESS_SECRET.to_vec(),
        refresh_token_secret: REFRESH_SECRET.to_vec(),
        secure_cookies: true,
        store_timeout: Duration::from_secs(5),
        bcrypt_cost: TEST_BCRYPT_COST,
        login_attempts_per_minute: 1000,
        cors_origins: Vec::new(),
    }
}

pub fn build_test_app(config: ServerConfig) -> TestApp {
    let router = create_app(&config).expect("Failed to create app");
    let jwt = JwtConfig::new(&config.access_token_secret, &config.refresh_token_secret)
        .expect("Invalid test secrets");

    TestApp {
        router,
        db: config.db,
        jwt,
    }
}

pub async fn create_test_app() -> TestApp {
    build_test_app(test_config().await)
}

/// Insert a user directly into the store. Returns the user's UUID.
pub async fn create_user(db: &Database, email: &str, password: &str, role: UserRole) -> String {
    let uuid = uuid::Uuid::new_v4().to_string();
    let hash = hash_password(password.to_string(), TEST_BCRYPT_COST)
        .await
        .expect("Failed to hash password");
    db.users()
        .create(&uuid, email, &hash, role)
        .await
        .expect("Failed to create user");
    uuid
}

pub fn access_token(jwt: &JwtConfig, role: UserRole) -> String {
    jwt.issue_access_token(&Identity::new(uuid::Uuid::new_v4().to_string(), role))
        .expect("Failed to issue token")
        .token
}

pub fn json_request(method: &str, uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// All `Set-Cookie` header values of a response.
pub fn extract_set_cookies<B>(response: &Response<B>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect()
}

/// The `Set-Cookie` value for `name`, if present.
pub fn find_cookie<B>(response: &Response<B>, name: &str) -> Option<String> {
    let prefix = format!("{}=", name);
    extract_set_cookies(response)
        .into_iter()
        .find(|c| c.starts_with(&prefix))
}

/// Cookie value without attributes.
pub fn cookie_value(set_cookie: &str) -> &str {
    set_cookie
        .split(';')
        .next()
        .and_then(|pair| pair.split_once('='))
        .map(|(_, value)| value)
        .unwrap_or("")
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}
