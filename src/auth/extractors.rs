//! Axum extractors for authentication.

use std::marker::PhantomData;

use axum::{extract::FromRequestParts, http::request::Parts};

use super::errors::ApiAuthError;
use super::gates::{authenticate, check_role};
use super::state::HasAuthBackend;
use crate::db::UserRole;
use crate::jwt::Identity;

/// Role requirement checked by [`Auth`].
pub trait RoleConstraint: Send + Sync + 'static {
    /// `None` means any authenticated identity is accepted.
    fn required() -> Option<UserRole>;
}

/// Any authenticated user.
pub struct AnyRole;

impl RoleConstraint for AnyRole {
    fn required() -> Option<UserRole> {
        None
    }
}

/// Only identities with the admin role.
pub struct AdminOnly;

impl RoleConstraint for AdminOnly {
    fn required() -> Option<UserRole> {
        Some(UserRole::Admin)
    }
}

/// Extractor for handlers that need the caller's identity.
///
/// Reuses the identity left by `authentication_gate` when the route sits
/// behind one, and verifies the access token itself otherwise.
pub struct Auth<R: RoleConstraint = AnyRole> {
    pub identity: Identity,
    _role: PhantomData<R>,
}

impl<S, R> FromRequestParts<S> for Auth<R>
where
    S: HasAuthBackend + Send + Sync,
    R: RoleConstraint,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let identity = match parts.extensions.get::<Identity>() {
            Some(identity) => identity.clone(),
            None => authenticate(&parts.headers, state.jwt())?,
        };

        if let Some(required) = R::required() {
            check_role(&identity, required)?;
        }

        Ok(Auth {
            identity,
            _role: PhantomData,
        })
    }
}
