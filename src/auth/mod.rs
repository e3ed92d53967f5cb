//! JWT authentication with role-based access control.
//!
//! Access tokens (15 min) travel in the `accessToken` cookie or a Bearer
//! header; refresh tokens (7 days) only in the `refreshToken` cookie.
//! Protected routes run `authentication_gate` then `authorization_gate`.

mod cookie;
mod errors;
mod extractors;
mod gates;
mod state;

pub use cookie::{
    ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, bearer_token, clear_cookie, get_cookie, token_cookie,
};
pub use errors::{ApiAuthError, AuthErrorKind};
pub use extractors::{AdminOnly, AnyRole, Auth, RoleConstraint};
pub use gates::{authenticate, authentication_gate, authorization_gate, check_role};
pub use state::HasAuthBackend;
