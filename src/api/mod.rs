mod auth;
mod error;
mod users;
mod vehicles;

use axum::Router;
use std::{sync::Arc, time::Duration};

use crate::db::Database;
use crate::jwt::JwtConfig;
use crate::rate_limit::RateLimitConfig;

pub use error::{ApiError, ResultExt};
pub(crate) use auth::{normalize_email, validate_email};

/// Settings shared by the API sub-routers.
#[derive(Clone)]
pub struct ApiConfig {
    pub secure_cookies: bool,
    pub store_timeout: Duration,
    pub bcrypt_cost: u32,
    pub rate_limit: RateLimitConfig,
}

/// Create the API router. Credential routes sit at the root next to `/vehicles`.
pub fn create_api_router(db: Database, jwt: Arc<JwtConfig>, config: ApiConfig) -> Router {
    let auth_state = auth::AuthState {
        db: db.clone(),
        jwt: jwt.clone(),
        secure_cookies: config.secure_cookies,
        store_timeout: config.store_timeout,
        bcrypt_cost: config.bcrypt_cost,
        rate_limit: config.rate_limit,
        dummy_hash: Arc::default(),
    };

    let vehicles_state = vehicles::VehiclesState {
        db,
        jwt: jwt.clone(),
    };

    let users_state = users::UsersState { jwt };

    Router::new()
        .merge(auth::router(auth_state))
        .nest("/vehicles", vehicles::router(vehicles_state))
        .nest("/users", users::router(users_state))
}
