use std::sync::Arc;

use axum::{Json, extract::State, http::HeaderMap};
use axum_extra::extract::cookie::CookieJar;
use platform::{AuthUser, PlatformError};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::{
    auth::{Authenticated, discover_token, role_of, with_session_cookies, without_session_cookies},
    error::AppError,
    models::{Profile, Role, Table},
    state::State as AppState,
    utils::{Payload, is_email, present, require},
};

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    email: Option<String>,
    password: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
}

impl Credentials {
    fn email(&self) -> Result<String, AppError> {
        Ok(require(&self.email, "email")?.to_lowercase())
    }

    fn password(&self) -> Result<&str, AppError> {
        self.password
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| AppError::bad_request("password is required"))
    }
}

fn user_json(user: &AuthUser, role: Role) -> Value {
    json!({ "id": user.id, "email": user.email, "role": role })
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Payload(credentials): Payload<Credentials>,
) -> Result<(CookieJar, Json<Value>), AppError> {
    let email = credentials.email()?;
    let password = credentials.password()?;

    let session = state
        .platform
        .sign_in_with_password(&email, password)
        .await
        .map_err(|e| {
            if e.is_auth_rejection() {
                AppError::Unauthorized("Invalid email or password".to_string())
            } else {
                e.into()
            }
        })?;

    let role = role_of(&state, &session.user)
        .await?
        .unwrap_or(Role::Customer);

    info!("User {} logged in", session.user.id);

    let body = json!({
        "user": user_json(&session.user, role),
        "session": {
            "access_token": session.access_token,
            "refresh_token": session.refresh_token,
            "expires_in": session.expires_in,
            "expires_at": session.expires_at,
        },
    });

    Ok((
        with_session_cookies(jar, &session, state.config.production),
        Json(body),
    ))
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Payload(credentials): Payload<Credentials>,
) -> Result<(CookieJar, Json<Value>), AppError> {
    let email = credentials.email()?;
    let password = credentials.password()?;

    if !is_email(&email) {
        return Err(AppError::bad_request("email is invalid"));
    }

    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::bad_request(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let sign_up = state
        .platform
        .sign_up(&email, password)
        .await
        .map_err(|e| match e {
            PlatformError::Api { status, message } if status < 500 => AppError::BadRequest(message),
            e => e.into(),
        })?;

    state
        .platform
        .upsert(
            Profile::NAME,
            vec![json!({
                "id": sign_up.user.id,
                "email": email,
                "role": Role::Customer,
                "first_name": present(&credentials.first_name),
                "last_name": present(&credentials.last_name),
            })],
            &["id"],
        )
        .await?;

    info!("Registered user {}", sign_up.user.id);

    let body = json!({
        "user": user_json(&sign_up.user, Role::Customer),
        "session": sign_up.session.as_ref().map(|s| json!({
            "access_token": s.access_token,
            "refresh_token": s.refresh_token,
            "expires_in": s.expires_in,
            "expires_at": s.expires_at,
        })),
    });

    let jar = match &sign_up.session {
        Some(session) => with_session_cookies(jar, session, state.config.production),
        None => jar,
    };

    Ok((jar, Json(body)))
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    jar: CookieJar,
) -> (CookieJar, Json<Value>) {
    if let Some(token) = discover_token(&headers, &state.config.session_cookie()) {
        if let Err(e) = state.platform.sign_out(&token).await {
            warn!("Platform sign-out failed: {e}");
        }
    }

    (
        without_session_cookies(jar, state.config.production),
        Json(json!({ "success": true })),
    )
}

pub async fn me(
    State(state): State<Arc<AppState>>,
    caller: Authenticated,
) -> Result<Json<Value>, AppError> {
    let role = role_of(&state, &caller.user)
        .await?
        .unwrap_or(Role::Customer);

    Ok(Json(json!({ "user": user_json(&caller.user, role) })))
}
