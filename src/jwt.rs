//! JWT token generation and validation.
//!
//! Access and refresh tokens are signed with two distinct HS256 secrets.
//! Both kinds are stateless: nothing about an issued token is persisted.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

use crate::db::UserRole;

/// Access token duration: 15 minutes
pub const ACCESS_TOKEN_DURATION_SECS: u64 = 15 * 60;

/// Refresh token duration: 7 days
pub const REFRESH_TOKEN_DURATION_SECS: u64 = 7 * 24 * 60 * 60;

const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

/// Token type for distinguishing access vs refresh tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// Short-lived access token, replayed on every request
    Access,
    /// Long-lived refresh token, only used to mint access tokens
    Refresh,
}

impl TokenType {
    fn duration(self) -> u64 {
        match self {
            TokenType::Access => ACCESS_TOKEN_DURATION_SECS,
            TokenType::Refresh => REFRESH_TOKEN_DURATION_SECS,
        }
    }
}

/// Who a token was issued to. Fixed for the lifetime of the token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// User UUID
    pub user_id: String,
    pub role: UserRole,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, role: UserRole) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }
}

/// JWT claims shared by both token kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user UUID)
    pub sub: String,
    /// User role at the time of login
    pub role: UserRole,
    /// Token type
    #[serde(rename = "typ")]
    pub token_type: TokenType,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Result of signing a token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// The JWT token string
    pub token: String,
    /// Expiration timestamp (Unix seconds)
    pub expires_at: u64,
    /// Token duration in seconds
    pub duration: u64,
}

/// Startup-time problems with the signing secrets.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("{0} token secret is not set")]
    MissingSecret(&'static str),
    #[error("access and refresh token secrets must be different")]
    SharedSecret,
}

/// Errors that can occur during JWT operations.
#[derive(Debug, Error)]
pub enum JwtError {
    #[error("failed to encode token: {0}")]
    Encoding(#[source] jsonwebtoken::errors::Error),
    #[error("token has expired")]
    Expired,
    #[error("invalid token: {0}")]
    Invalid(#[source] jsonwebtoken::errors::Error),
    /// A refresh token presented as an access token or the other way around
    #[error("wrong token type")]
    WrongTokenType,
    #[error("system time error")]
    TimeError,
}

#[derive(Clone)]
struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl KeyPair {
    fn from_secret(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

/// Token service and verifier. Built once at startup from explicit secrets.
#[derive(Clone)]
pub struct JwtConfig {
    access: KeyPair,
    refresh: KeyPair,
}

impl JwtConfig {
    /// Create the configuration, rejecting empty or shared secrets.
    pub fn new(access_secret: &[u8], refresh_secret: &[u8]) -> Result<Self, ConfigurationError> {
        if access_secret.is_empty() {
            return Err(ConfigurationError::MissingSecret("access"));
        }
        if refresh_secret.is_empty() {
            return Err(ConfigurationError::MissingSecret("refresh"));
        }
        if access_secret == refresh_secret {
            return Err(ConfigurationError::SharedSecret);
        }

        Ok(Self {
            access: KeyPair::from_secret(access_secret),
            refresh: KeyPair::from_secret(refresh_secret),
        })
    }

    fn keys(&self, token_type: TokenType) -> &KeyPair {
        match token_type {
            TokenType::Access => &self.access,
            TokenType::Refresh => &self.refresh,
        }
    }

    /// Issue an access token valid for 15 minutes.
    pub fn issue_access_token(&self, identity: &Identity) -> Result<IssuedToken, JwtError> {
        self.issue_at(identity, TokenType::Access, now()?)
    }

    /// Issue a refresh token valid for 7 days.
    pub fn issue_refresh_token(&self, identity: &Identity) -> Result<IssuedToken, JwtError> {
        self.issue_at(identity, TokenType::Refresh, now()?)
    }

    /// Issue a token as if the current time were `issued_at`.
    pub fn issue_at(
        &self,
        identity: &Identity,
        token_type: TokenType,
        issued_at: u64,
    ) -> Result<IssuedToken, JwtError> {
        let duration = token_type.duration();
        let claims = Claims {
            sub: identity.user_id.clone(),
            role: identity.role,
            token_type,
            iat: issued_at,
            exp: issued_at + duration,
        };

        let token = jsonwebtoken::encode(
            &Header::new(SIGNING_ALGORITHM),
            &claims,
            &self.keys(token_type).encoding,
        )
        .map_err(JwtError::Encoding)?;

        Ok(IssuedToken {
            token,
            expires_at: claims.exp,
            duration,
        })
    }

    /// Validate a token with the key belonging to `token_type`.
    pub fn verify(&self, token: &str, token_type: TokenType) -> Result<Identity, JwtError> {
        let mut validation = Validation::new(SIGNING_ALGORITHM);
        validation.leeway = 0;

        let token_data =
            jsonwebtoken::decode::<Claims>(token, &self.keys(token_type).decoding, &validation)
                .map_err(|e| match e.kind() {
                    ErrorKind::ExpiredSignature => JwtError::Expired,
                    _ => JwtError::Invalid(e),
                })?;

        if token_data.claims.token_type != token_type {
            return Err(JwtError::WrongTokenType);
        }

        Ok(Identity {
            user_id: token_data.claims.sub,
            role: token_data.claims.role,
        })
    }

    /// Validate an access token.
    pub fn verify_access_token(&self, token: &str) -> Result<Identity, JwtError> {
        self.verify(token, TokenType::Access)
    }

    /// Validate a refresh token.
    pub fn verify_refresh_token(&self, token: &str) -> Result<Identity, JwtError> {
        self.verify(token, TokenType::Refresh)
    }
}

fn now() -> Result<u64, JwtError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|_| JwtError::TimeError)
}
