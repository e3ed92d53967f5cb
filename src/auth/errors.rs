//! Authentication error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Why a request was turned away by a gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    /// No access token in the cookie or the Authorization header
    NotAuthenticated,
    /// Token present but expired, malformed or badly signed
    InvalidToken,
    /// Authenticated, but the role does not match
    InsufficientRole,
    /// Authorization ran without an identity on the request
    GateMisconfigured,
}

/// Gate rejection, rendered as a JSON error with a generic message.
#[derive(Debug)]
pub struct ApiAuthError {
    kind: AuthErrorKind,
}

impl ApiAuthError {
    pub fn kind(&self) -> AuthErrorKind {
        self.kind
    }

    pub fn status_code(&self) -> StatusCode {
        match self.kind {
            AuthErrorKind::NotAuthenticated | AuthErrorKind::InvalidToken => {
                StatusCode::UNAUTHORIZED
            }
            AuthErrorKind::InsufficientRole => StatusCode::FORBIDDEN,
            AuthErrorKind::GateMisconfigured => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &'static str {
        match self.kind {
            AuthErrorKind::NotAuthenticated => "Not authenticated",
            AuthErrorKind::InvalidToken => "Invalid or expired token",
            AuthErrorKind::InsufficientRole => "Insufficient permissions",
            AuthErrorKind::GateMisconfigured => "Internal server error",
        }
    }
}

impl From<AuthErrorKind> for ApiAuthError {
    fn from(kind: AuthErrorKind) -> Self {
        Self { kind }
    }
}

impl IntoResponse for ApiAuthError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: &'static str,
        }

        (
            self.status_code(),
            Json(ErrorResponse {
                error: self.message(),
            }),
        )
            .into_response()
    }
}
