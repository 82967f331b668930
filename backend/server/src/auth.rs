//! Request authentication.
//!
//! Every protected handler takes one of the extractors below instead of re-deriving the token
//! itself. Token discovery checks, in order:
//!
//! 1. the platform browser client's session cookie `sb-<project-ref>-auth-token` (JSON, possibly
//!    `base64-` encoded and split into `.0`, `.1`, ... chunks),
//! 2. an `Authorization: Bearer` header,
//! 3. the plain `sb-access-token` cookie set by our own login route.
//!
//! The token is then verified with the platform's user call (failure: 401) and, for admin routes,
//! the `profiles.role` column is checked (failure: 403).
use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{
    Engine,
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
};
use platform::{AuthUser, Query, Session};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    error::AppError,
    models::{Customer, Profile, Role},
    state::State,
    store,
};

pub const ACCESS_COOKIE: &str = "sb-access-token";
pub const REFRESH_COOKIE: &str = "sb-refresh-token";
const REFRESH_MAX_AGE_SECS: i64 = 60 * 60 * 24 * 30;

pub fn discover_token(headers: &HeaderMap, session_cookie: &str) -> Option<String> {
    let jar = CookieJar::from_headers(headers);

    session_cookie_value(&jar, session_cookie)
        .and_then(|raw| decode_session(&raw))
        .or_else(|| bearer_token(headers))
        .or_else(|| {
            jar.get(ACCESS_COOKIE)
                .map(|c| c.value().trim().to_string())
                .filter(|t| !t.is_empty())
        })
}

fn session_cookie_value(jar: &CookieJar, name: &str) -> Option<String> {
    if let Some(cookie) = jar.get(name) {
        return Some(cookie.value().to_string());
    }

    let mut joined = String::new();
    for index in 0.. {
        match jar.get(&format!("{name}.{index}")) {
            Some(chunk) => joined.push_str(chunk.value()),
            None => break,
        }
    }

    (!joined.is_empty()).then_some(joined)
}

/// Access token out of a session cookie value, `None` when it is not a session we understand.
pub fn decode_session(raw: &str) -> Option<String> {
    let json = match raw.strip_prefix("base64-") {
        Some(encoded) => {
            let bytes = URL_SAFE_NO_PAD
                .decode(encoded.trim_end_matches('='))
                .or_else(|_| STANDARD.decode(encoded))
                .ok()?;
            String::from_utf8(bytes).ok()?
        }
        None => raw.to_string(),
    };

    let token = match serde_json::from_str::<Value>(&json).ok()? {
        Value::Object(session) => session.get("access_token")?.as_str().map(str::to_string),
        Value::Array(parts) => parts.first()?.as_str().map(str::to_string),
        _ => None,
    };

    token.filter(|t| !t.is_empty())
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

pub async fn role_of(state: &State, user: &AuthUser) -> Result<Option<Role>, AppError> {
    let profile: Option<Profile> =
        store::fetch_one(state.platform.as_ref(), Query::new().eq("id", user.id)).await?;

    Ok(profile.and_then(|p| Role::parse(&p.role)))
}

/// A caller whose token the platform recognised.
pub struct Authenticated {
    pub user: AuthUser,
    pub token: String,
}

impl Authenticated {
    pub async fn from_headers(state: &State, headers: &HeaderMap) -> Result<Self, AppError> {
        let token = discover_token(headers, &state.config.session_cookie())
            .ok_or_else(|| AppError::Unauthorized("Unauthorized".to_string()))?;

        let user = state.platform.get_user(&token).await.map_err(|e| {
            debug!("Token rejected: {e}");
            AppError::Unauthorized("Invalid or expired session".to_string())
        })?;

        Ok(Self { user, token })
    }
}

impl FromRequestParts<Arc<State>> for Authenticated {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<State>,
    ) -> Result<Self, Self::Rejection> {
        Authenticated::from_headers(state, &parts.headers).await
    }
}

/// Present when the request carries a valid token, never rejects.
pub struct MaybeAuthenticated(pub Option<Authenticated>);

impl FromRequestParts<Arc<State>> for MaybeAuthenticated {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<State>,
    ) -> Result<Self, Self::Rejection> {
        Ok(MaybeAuthenticated(
            Authenticated::from_headers(state, &parts.headers).await.ok(),
        ))
    }
}

/// An authenticated caller whose profile carries the admin role.
pub struct AdminUser {
    pub user: AuthUser,
}

impl FromRequestParts<Arc<State>> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<State>,
    ) -> Result<Self, Self::Rejection> {
        let Authenticated { user, .. } = Authenticated::from_headers(state, &parts.headers).await?;

        match role_of(state, &user).await {
            Ok(Some(Role::Admin)) => Ok(AdminUser { user }),
            Ok(_) => Err(AppError::Forbidden("Forbidden".to_string())),
            Err(e) => {
                warn!("Role lookup for {} failed: {e}", user.id);
                Err(AppError::Forbidden("Forbidden".to_string()))
            }
        }
    }
}

/// An authenticated caller together with the customer record they own.
pub struct PortalCustomer {
    pub user: AuthUser,
    pub customer: Customer,
}

impl FromRequestParts<Arc<State>> for PortalCustomer {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<State>,
    ) -> Result<Self, Self::Rejection> {
        let Authenticated { user, .. } = Authenticated::from_headers(state, &parts.headers).await?;

        let customer: Option<Customer> = store::fetch_one(
            state.platform.as_ref(),
            Query::new().eq("user_id", user.id),
        )
        .await?;

        customer
            .map(|customer| PortalCustomer { user, customer })
            .ok_or_else(|| AppError::not_found("Customer not found"))
    }
}

fn cookie(name: &'static str, value: String, max_age_secs: i64, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::seconds(max_age_secs))
        .build()
}

pub fn with_session_cookies(jar: CookieJar, session: &Session, secure: bool) -> CookieJar {
    jar.add(cookie(
        ACCESS_COOKIE,
        session.access_token.clone(),
        session.expires_in,
        secure,
    ))
    .add(cookie(
        REFRESH_COOKIE,
        session.refresh_token.clone(),
        REFRESH_MAX_AGE_SECS,
        secure,
    ))
}

pub fn without_session_cookies(jar: CookieJar, secure: bool) -> CookieJar {
    jar.add(cookie(ACCESS_COOKIE, String::new(), 0, secure))
        .add(cookie(REFRESH_COOKIE, String::new(), 0, secure))
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    const SESSION: &str = "sb-abc-auth-token";

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (key, value) in pairs {
            headers.append(*key, HeaderValue::from_str(value).unwrap());
        }
        headers
    }

    #[test]
    fn test_decode_session_formats() {
        assert_eq!(
            decode_session(r#"{"access_token":"t1","refresh_token":"r"}"#).as_deref(),
            Some("t1")
        );
        assert_eq!(decode_session(r#"["t2","r",null]"#).as_deref(), Some("t2"));

        let encoded = URL_SAFE_NO_PAD.encode(r#"{"access_token":"t3"}"#);
        assert_eq!(decode_session(&format!("base64-{encoded}")).as_deref(), Some("t3"));

        assert_eq!(decode_session("not json"), None);
        assert_eq!(decode_session(r#"{"access_token":""}"#), None);
    }

    #[test]
    fn test_session_cookie_wins() {
        let headers = headers(&[
            ("cookie", r#"sb-abc-auth-token=["session","r"]; sb-access-token=plain"#),
            ("authorization", "Bearer header"),
        ]);

        assert_eq!(discover_token(&headers, SESSION).as_deref(), Some("session"));
    }

    #[test]
    fn test_chunked_session_cookie() {
        let encoded = URL_SAFE_NO_PAD.encode(r#"{"access_token":"chunked"}"#);
        let (first, second) = encoded.split_at(10);
        let cookie = format!("sb-abc-auth-token.0=base64-{first}; sb-abc-auth-token.1={second}");
        let headers = headers(&[("cookie", &cookie)]);

        assert_eq!(discover_token(&headers, SESSION).as_deref(), Some("chunked"));
    }

    #[test]
    fn test_bearer_before_plain_cookie() {
        let headers = headers(&[
            ("cookie", "sb-abc-auth-token=garbage; sb-access-token=plain"),
            ("authorization", "Bearer header"),
        ]);

        assert_eq!(discover_token(&headers, SESSION).as_deref(), Some("header"));
    }

    #[test]
    fn test_plain_cookie_last() {
        let headers = headers(&[("cookie", "sb-access-token=plain")]);
        assert_eq!(discover_token(&headers, SESSION).as_deref(), Some("plain"));

        assert_eq!(discover_token(&HeaderMap::new(), SESSION), None);
    }
}
