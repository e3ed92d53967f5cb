//! Credential endpoints: register, login, refresh, logout.

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    middleware,
    response::{AppendHeaders, IntoResponse},
    routing::post,
};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::error::{ApiError, ResultExt};
use crate::auth::{
    ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, clear_cookie, get_cookie, token_cookie,
};
use crate::db::{Database, User, UserRole};
use crate::jwt::{Identity, JwtConfig};
use crate::password::{hash_password, verify_password};
use crate::rate_limit::{RateLimitConfig, rate_limit};

const MAX_EMAIL_LEN: usize = 254;
const MIN_PASSWORD_LEN: usize = 6;
const MAX_PASSWORD_LEN: usize = 128;
const DUMMY_PASSWORD: &str = "propelize-unknown-account";

#[derive(Clone)]
pub struct AuthState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub secure_cookies: bool,
    pub store_timeout: Duration,
    pub bcrypt_cost: u32,
    pub rate_limit: RateLimitConfig,
    /// Hash checked against when the email is unknown, built on first use
    pub dummy_hash: Arc<OnceCell<String>>,
}

pub fn router(state: AuthState) -> Router {
    let login_router = Router::new()
        .route("/login", post(login))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.rate_limit.login.clone(),
            rate_limit,
        ));

    let register_router = Router::new()
        .route("/register", post(register))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.rate_limit.register.clone(),
            rate_limit,
        ));

    let session_router = Router::new()
        .route("/refresh-token", post(refresh_token))
        .route("/logout", post(logout))
        .with_state(state);

    Router::new()
        .merge(login_router)
        .merge(register_router)
        .merge(session_router)
}

#[derive(Deserialize)]
struct CredentialsRequest {
    email: String,
    password: String,
}

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    access_token: String,
    role: UserRole,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    access_token: String,
}

/// Trim and lowercase; the store compares emails case-insensitively as well.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub(crate) fn validate_email(email: &str) -> Result<(), ApiError> {
    if email.is_empty() {
        return Err(ApiError::bad_request("Email cannot be empty"));
    }
    if email.len() > MAX_EMAIL_LEN {
        return Err(ApiError::bad_request("Email is too long"));
    }
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(ApiError::bad_request("Invalid email format"));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), ApiError> {
    let len = password.chars().count();
    if len < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    if len > MAX_PASSWORD_LEN {
        return Err(ApiError::bad_request(format!(
            "Password cannot be longer than {} characters",
            MAX_PASSWORD_LEN
        )));
    }
    Ok(())
}

fn invalid_credentials() -> ApiError {
    ApiError::unauthorized("Invalid email or password")
}

async fn register(
    State(state): State<AuthState>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload?;
    let email = normalize_email(&payload.email);
    validate_email(&email)?;
    validate_password(&payload.password)?;

    let available = state
        .db
        .users()
        .is_email_available(&email)
        .await
        .db_err("Failed to check email availability")?;

    if !available {
        return Err(ApiError::conflict("Email is already registered"));
    }

    let password_hash = hash_password(payload.password, state.bcrypt_cost)
        .await
        .internal_err("Failed to hash password")?;

    let uuid = uuid::Uuid::new_v4().to_string();
    match state
        .db
        .users()
        .create(&uuid, &email, &password_hash, UserRole::User)
        .await
    {
        Ok(_) => {}
        // Lost a race with a concurrent registration of the same address
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            return Err(ApiError::conflict("Email is already registered"));
        }
        Err(e) => return Err(ApiError::db_error("Failed to create user", e)),
    }

    info!(email = %email, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "User created",
        }),
    ))
}

/// Credential store lookup bounded by the configured timeout.
async fn find_user(state: &AuthState, email: &str) -> Result<Option<User>, ApiError> {
    tokio::time::timeout(state.store_timeout, state.db.users().get_by_email(email))
        .await
        .map_err(|_| {
            ApiError::store_unavailable(
                "Credential store lookup timed out",
                format!("no answer after {}ms", state.store_timeout.as_millis()),
            )
        })?
        .store_err("Credential store lookup failed")
}

/// Spend one bcrypt verification on an unknown email so it takes as long as a wrong password.
async fn verify_dummy(state: &AuthState, password: String) -> Result<(), ApiError> {
    let hash = state
        .dummy_hash
        .get_or_try_init(|| hash_password(DUMMY_PASSWORD.to_string(), state.bcrypt_cost))
        .await
        .internal_err("Failed to hash password")?;
    verify_password(password, hash.clone())
        .await
        .internal_err("Failed to verify password")?;
    Ok(())
}

async fn login(
    State(state): State<AuthState>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload?;
    let email = normalize_email(&payload.email);

    if email.is_empty() || payload.password.is_empty() {
        return Err(invalid_credentials());
    }

    let Some(user) = find_user(&state, &email).await? else {
        verify_dummy(&state, payload.password).await?;
        warn!(email = %email, "Login failed: unknown email");
        return Err(invalid_credentials());
    };

    let matches = verify_password(payload.password, user.password_hash)
        .await
        .internal_err("Failed to verify password")?;

    if !matches {
        warn!(email = %email, "Login failed: wrong password");
        return Err(invalid_credentials());
    }

    let identity = Identity::new(user.uuid, user.role);
    let access = state
        .jwt
        .issue_access_token(&identity)
        .internal_err("Failed to issue access token")?;
    let refresh = state
        .jwt
        .issue_refresh_token(&identity)
        .internal_err("Failed to issue refresh token")?;

    info!(email = %email, role = %identity.role, "User logged in");

    Ok((
        StatusCode::OK,
        AppendHeaders([
            (
                SET_COOKIE,
                token_cookie(
                    REFRESH_COOKIE_NAME,
                    &refresh.token,
                    refresh.duration,
                    state.secure_cookies,
                ),
            ),
            (
                SET_COOKIE,
                token_cookie(
                    ACCESS_COOKIE_NAME,
                    &access.token,
                    access.duration,
                    state.secure_cookies,
                ),
            ),
        ]),
        Json(LoginResponse {
            access_token: access.token,
            role: identity.role,
        }),
    ))
}

async fn refresh_token(
    State(state): State<AuthState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let token = get_cookie(&headers, REFRESH_COOKIE_NAME)
        .ok_or_else(|| ApiError::unauthorized("Not authenticated"))?;

    let identity = state.jwt.verify_refresh_token(token).map_err(|e| {
        debug!(error = %e, "Refresh token rejected");
        ApiError::forbidden("Invalid or expired refresh token")
    })?;

    let access = state
        .jwt
        .issue_access_token(&identity)
        .internal_err("Failed to issue access token")?;

    Ok((
        StatusCode::OK,
        [(
            SET_COOKIE,
            token_cookie(
                ACCESS_COOKIE_NAME,
                &access.token,
                access.duration,
                state.secure_cookies,
            ),
        )],
        Json(RefreshResponse {
            access_token: access.token,
        }),
    ))
}

async fn logout(State(state): State<AuthState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        AppendHeaders([
            (
                SET_COOKIE,
                clear_cookie(ACCESS_COOKIE_NAME, state.secure_cookies),
            ),
            (
                SET_COOKIE,
                clear_cookie(REFRESH_COOKIE_NAME, state.secure_cookies),
            ),
        ]),
        Json(MessageResponse {
            message: "Logged out",
        }),
    )
}
