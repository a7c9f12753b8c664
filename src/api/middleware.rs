use crate::api::AppState;
use crate::error::{AppError, AuthError, Result};
use crate::models::{SessionId, TokenState};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, HeaderValue},
    response::Redirect,
};
use anyhow::Context;
use std::convert::Infallible;
use std::sync::Arc;

pub const SESSION_COOKIE: &str = "vt_session";

/// Session id from the request cookie, if the browser sent a valid one
pub struct MaybeSession(pub Option<SessionId>);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for MaybeSession {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> std::result::Result<Self, Self::Rejection> {
        Ok(MaybeSession(session_from_headers(&parts.headers)))
    }
}

/// Page guard: the session must hold a token (possibly expired, it will be
/// refreshed on use). Otherwise the browser is sent to the login page.
pub struct RequireLogin(pub SessionId);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for RequireLogin {
    type Rejection = Redirect;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> std::result::Result<Self, Self::Rejection> {
        let session = session_from_headers(&parts.headers).ok_or_else(|| Redirect::to("/login"))?;

        if state.tokens.token_state(session).await == TokenState::Absent {
            tracing::debug!("Session {} has no token, redirecting to login", session);
            return Err(Redirect::to("/login"));
        }

        Ok(RequireLogin(session))
    }
}

/// API guard: same check as [`RequireLogin`] but rejects with 401
pub struct RequireToken(pub SessionId);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for RequireToken {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self> {
        let session = session_from_headers(&parts.headers)
            .ok_or(AppError::Auth(AuthError::NotAuthenticated))?;

        if state.tokens.token_state(session).await == TokenState::Absent {
            return Err(AuthError::NotAuthenticated.into());
        }

        Ok(RequireToken(session))
    }
}

fn session_from_headers(headers: &HeaderMap) -> Option<SessionId> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().strip_prefix(SESSION_COOKIE)?.strip_prefix('='))
        .find_map(|value| value.parse().ok())
}

pub fn session_cookie(session: SessionId, secure: bool) -> Result<HeaderValue> {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax",
        SESSION_COOKIE, session
    );
    if secure {
        cookie.push_str("; Secure");
    }
    let value = HeaderValue::from_str(&cookie)
        .with_context(|| format!("Session cookie for {} is not a valid header value", session))?;
    Ok(value)
}
