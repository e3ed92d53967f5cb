//! Rate limiting for authentication endpoints.
//!
//! Token bucket per client IP, to slow down password guessing and signup spam.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::{net::SocketAddr, num::NonZeroU32, sync::Arc};
use tracing::warn;

/// Per-IP rate limiter.
pub type IpLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Limiters for the credential endpoints.
#[derive(Clone)]
pub struct RateLimitConfig {
    /// `POST /login`
    pub login: Arc<IpLimiter>,
    /// `POST /register`
    pub register: Arc<IpLimiter>,
}

impl RateLimitConfig {
    /// Both limiters allow `per_minute` requests per IP (minimum 1).
    pub fn new(per_minute: u32) -> Self {
        let quota = Quota::per_minute(NonZeroU32::new(per_minute).unwrap_or(NonZeroU32::MIN));
        Self {
            login: Arc::new(RateLimiter::keyed(quota)),
            register: Arc::new(RateLimiter::keyed(quota)),
        }
    }
}

/// Peer address from `ConnectInfo`; requests without one share a bucket.
fn client_key(request: &Request) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Middleware that answers 429 once the caller's bucket is empty.
pub async fn rate_limit(
    State(limiter): State<Arc<IpLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let ip = client_key(&request);

    match limiter.check_key(&ip) {
        Ok(_) => next.run(request).await,
        Err(_) => {
            warn!(ip = %ip, path = %request.uri().path(), "Rate limit exceeded");
            (
                StatusCode::TOO_MANY_REQUESTS,
                axum::Json(serde_json::json!({
                    "error": "Too many attempts. Please wait before trying again."
                })),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, body::Body, middleware, routing::post};
    use tower::ServiceExt;

    fn app(per_minute: u32) -> Router {
        let config = RateLimitConfig::new(per_minute);
        Router::new()
            .route("/", post(|| async { "ok" }))
            .route_layer(middleware::from_fn_with_state(config.login, rate_limit))
    }

    async fn status(app: &Router) -> StatusCode {
        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/")
            .body(Body::empty())
            .unwrap();
        app.clone().oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn test_limit_exceeded() {
        let app = app(2);

        assert_eq!(status(&app).await, StatusCode::OK);
        assert_eq!(status(&app).await, StatusCode::OK);
        assert_eq!(status(&app).await, StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_zero_means_one() {
        let app = app(0);

        assert_eq!(status(&app).await, StatusCode::OK);
        assert_eq!(status(&app).await, StatusCode::TOO_MANY_REQUESTS);
    }
}
