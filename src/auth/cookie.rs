//! Cookie and header parsing for credential transport.

use axum::http::{HeaderMap, header};

/// Cookie name for the access token (short-lived, 15 minutes).
pub const ACCESS_COOKIE_NAME: &str = "accessToken";

/// Cookie name for the refresh token (long-lived, 7 days).
pub const REFRESH_COOKIE_NAME: &str = "refreshToken";

/// Extract a cookie value from the Cookie header. Empty values count as absent.
pub fn get_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    for part in cookie_header.split(';') {
        let part = part.trim();
        if let Some((key, value)) = part.split_once('=') {
            if key.trim() == name {
                let value = value.trim();
                return (!value.is_empty()).then_some(value);
            }
        }
    }
    None
}

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Build a `Set-Cookie` value for a token. Always HttpOnly and SameSite=Strict.
pub fn token_cookie(name: &str, value: &str, max_age: u64, secure: bool) -> String {
    let secure = if secure { "; Secure" } else { "" };
    format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}{}",
        name, value, max_age, secure
    )
}

/// Build a `Set-Cookie` value that removes a token cookie.
pub fn clear_cookie(name: &str, secure: bool) -> String {
    token_cookie(name, "", 0, secure)
}
