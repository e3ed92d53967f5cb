//! Request-pipeline gates for `axum::middleware::from_fn_with_state`.
//!
//! `authentication_gate` must be the outer layer: it verifies the access token
//! and stores the resulting [`Identity`] in the request extensions, where
//! `authorization_gate` and the extractors pick it up.

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use tracing::{debug, error};

use super::cookie::{ACCESS_COOKIE_NAME, bearer_token, get_cookie};
use super::errors::{ApiAuthError, AuthErrorKind};
use super::state::HasAuthBackend;
use crate::db::UserRole;
use crate::jwt::{Identity, JwtConfig};

/// Verify the access token carried by a request.
/// The `accessToken` cookie wins over the Authorization header.
pub fn authenticate(headers: &HeaderMap, jwt: &JwtConfig) -> Result<Identity, AuthErrorKind> {
    let token = get_cookie(headers, ACCESS_COOKIE_NAME)
        .or_else(|| bearer_token(headers))
        .ok_or(AuthErrorKind::NotAuthenticated)?;

    jwt.verify_access_token(token).map_err(|e| {
        debug!(error = %e, "Access token rejected");
        AuthErrorKind::InvalidToken
    })
}

/// Exact role match, no hierarchy.
pub fn check_role(identity: &Identity, required: UserRole) -> Result<(), AuthErrorKind> {
    if identity.role == required {
        Ok(())
    } else {
        Err(AuthErrorKind::InsufficientRole)
    }
}

/// Reject requests without a valid access token; attach the identity otherwise.
pub async fn authentication_gate<S>(
    State(state): State<S>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiAuthError>
where
    S: HasAuthBackend + Clone + Send + Sync + 'static,
{
    let identity = authenticate(request.headers(), state.jwt())?;
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

/// Reject requests whose identity does not have exactly the required role.
pub async fn authorization_gate(
    State(required): State<UserRole>,
    request: Request,
    next: Next,
) -> Result<Response, ApiAuthError> {
    let identity = request.extensions().get::<Identity>().ok_or_else(|| {
        error!(
            path = %request.uri().path(),
            "Authorization gate ran without an identity; authentication gate missing or misordered"
        );
        AuthErrorKind::GateMisconfigured
    })?;

    check_role(identity, required)?;
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Router,
        body::Body,
        http::{StatusCode, header},
        middleware,
        routing::get,
    };
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    use crate::impl_has_auth_backend;

    #[derive(Clone)]
    struct TestState {
        jwt: Arc<JwtConfig>,
    }

    impl_has_auth_backend!(TestState);

    fn jwt() -> Arc<JwtConfig> {
        Arc::new(
            JwtConfig::new(
                b"access-secret-key-for-testing-only",
                b"refresh-secret-key-for-testing-only",
            )
            .unwrap(),
        )
    }

    fn gated_app(jwt: Arc<JwtConfig>, required: UserRole, hits: Arc<AtomicUsize>) -> Router {
        let state = TestState { jwt };
        Router::new()
            .route(
                "/",
                get(move || {
                    let hits = hits.clone();
                    async move {
                        hits.fetch_add(1, Ordering::SeqCst);
                        "ok"
                    }
                }),
            )
            .route_layer(middleware::from_fn_with_state(required, authorization_gate))
            .route_layer(middleware::from_fn_with_state(
                state,
                authentication_gate::<TestState>,
            ))
    }

    async fn send(app: Router, headers: &[(&str, String)]) -> StatusCode {
        let mut builder = axum::http::Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, value);
        }
        app.oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_no_credentials_never_reaches_handler() {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = gated_app(jwt(), UserRole::User, hits.clone());

        assert_eq!(send(app, &[]).await, StatusCode::UNAUTHORIZED);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_bearer_header_accepted() {
        let jwt = jwt();
        let token = jwt
            .issue_access_token(&Identity::new("uuid-1", UserRole::User))
            .unwrap()
            .token;
        let hits = Arc::new(AtomicUsize::new(0));
        let app = gated_app(jwt, UserRole::User, hits.clone());

        let status = send(
            app,
            &[(header::AUTHORIZATION.as_str(), format!("Bearer {}", token))],
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cookie_preferred_over_header() {
        let jwt = jwt();
        let token = jwt
            .issue_access_token(&Identity::new("uuid-1", UserRole::User))
            .unwrap()
            .token;
        let app = gated_app(jwt, UserRole::User, Arc::new(AtomicUsize::new(0)));

        // A broken cookie is not rescued by a good header
        let status = send(
            app,
            &[
                (header::COOKIE.as_str(), "accessToken=garbage".to_string()),
                (header::AUTHORIZATION.as_str(), format!("Bearer {}", token)),
            ],
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_wrong_role_forbidden() {
        let jwt = jwt();
        let token = jwt
            .issue_access_token(&Identity::new("uuid-1", UserRole::User))
            .unwrap()
            .token;
        let hits = Arc::new(AtomicUsize::new(0));
        let app = gated_app(jwt, UserRole::Admin, hits.clone());

        let status = send(
            app,
            &[(header::COOKIE.as_str(), format!("accessToken={}", token))],
        )
        .await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_admin_accepted_by_admin_gate() {
        let jwt = jwt();
        let token = jwt
            .issue_access_token(&Identity::new("uuid-1", UserRole::Admin))
            .unwrap()
            .token;
        let app = gated_app(jwt, UserRole::Admin, Arc::new(AtomicUsize::new(0)));

        let status = send(
            app,
            &[(header::COOKIE.as_str(), format!("accessToken={}", token))],
        )
        .await;

        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_authorization_without_authentication_fails_closed() {
        let app = Router::new().route("/", get(|| async { "ok" })).route_layer(
            middleware::from_fn_with_state(UserRole::User, authorization_gate),
        );

        assert_eq!(send(app, &[]).await, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_check_role_is_exact() {
        let admin = Identity::new("uuid-1", UserRole::Admin);
        let user = Identity::new("uuid-2", UserRole::User);

        assert_eq!(check_role(&admin, UserRole::Admin), Ok(()));
        assert_eq!(
            check_role(&user, UserRole::Admin),
            Err(AuthErrorKind::InsufficientRole)
        );
        // No hierarchy: admin does not satisfy a user-only requirement
        assert_eq!(
            check_role(&admin, UserRole::User),
            Err(AuthErrorKind::InsufficientRole)
        );
    }
}
