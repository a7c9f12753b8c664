use crate::api::middleware::{session_cookie, MaybeSession, RequireLogin};
use crate::api::AppState;
use crate::error::{AuthError, ErrorPage, ValidationError};
use crate::models::{RecommendationCriteria, SessionId};
use crate::views::{render, View};
use axum::{
    extract::{rejection::FormRejection, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Form, Router,
};
use serde::Deserialize;
use std::sync::Arc;

type PageResult = std::result::Result<Html<String>, ErrorPage>;

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    error: Option<String>,
}

pub fn page_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(index))
        .route("/login", get(login))
        .route("/callback", get(callback))
        .route("/logout", get(logout))
        .route("/dashboard", get(dashboard))
        .route("/recommend", get(recommend_form).post(recommend))
}

async fn index() -> Html<String> {
    render(View::Landing)
}

async fn login(
    State(state): State<Arc<AppState>>,
    MaybeSession(existing): MaybeSession,
) -> std::result::Result<Response, ErrorPage> {
    let authorize_url = state.tokens.get_authorize_url();
    let page = render(View::Login {
        authorize_url: authorize_url.as_str(),
    });

    match existing {
        Some(_) => Ok(page.into_response()),
        None => {
            let session = SessionId::new();
            tracing::debug!("Starting session {}", session);
            let cookie = session_cookie(session, state.session_cookie_secure)?;
            Ok(([(header::SET_COOKIE, cookie)], page).into_response())
        }
    }
}

async fn callback(
    State(state): State<Arc<AppState>>,
    MaybeSession(existing): MaybeSession,
    Query(params): Query<CallbackParams>,
) -> Response {
    if let Some(error) = params.error {
        tracing::warn!("Authorization was not granted: {}", error);
        return error_page(
            StatusCode::BAD_REQUEST,
            &format!("Spotify authorization was not granted: {}", error),
        );
    }

    let Some(code) = params.code.filter(|c| !c.is_empty()) else {
        return error_page(StatusCode::BAD_REQUEST, &AuthError::MissingCode.to_string());
    };

    // Provider redirects normally carry the cookie set by /login
    let (session, is_new) = match existing {
        Some(session) => (session, false),
        None => (SessionId::new(), true),
    };

    match state.tokens.exchange_code_for_token(session, &code).await {
        Ok(_) => {
            let redirect = Redirect::temporary("/dashboard");
            if !is_new {
                return redirect.into_response();
            }
            match session_cookie(session, state.session_cookie_secure) {
                Ok(cookie) => ([(header::SET_COOKIE, cookie)], redirect).into_response(),
                Err(e) => ErrorPage(e).into_response(),
            }
        }
        Err(e) => {
            tracing::warn!("Token exchange for session {} failed: {}", session, e);
            error_page(StatusCode::BAD_REQUEST, &e.to_string())
        }
    }
}

async fn logout(State(state): State<Arc<AppState>>, MaybeSession(existing): MaybeSession) -> Redirect {
    if let Some(session) = existing {
        if state.tokens.forget(session).await {
            tracing::info!("Session {} logged out", session);
        }
    }
    Redirect::to("/")
}

async fn dashboard(State(state): State<Arc<AppState>>, RequireLogin(session): RequireLogin) -> PageResult {
    let recs = state.recommender.dashboard(session).await?;
    Ok(render(View::Dashboard {
        seeds: &recs.seeds,
        tracks: &recs.tracks,
    }))
}

async fn recommend_form(RequireLogin(_): RequireLogin) -> Html<String> {
    render(View::RecommendForm)
}

async fn recommend(
    State(state): State<Arc<AppState>>,
    RequireLogin(session): RequireLogin,
    form: std::result::Result<Form<RecommendationCriteria>, FormRejection>,
) -> PageResult {
    let Form(criteria) = form.map_err(|e| ValidationError::Malformed(e.body_text()))?;

    let recs = state.recommender.custom(session, &criteria).await?;
    Ok(render(View::Results {
        criteria: &criteria,
        seeds: &recs.seeds,
        tracks: &recs.tracks,
    }))
}

fn error_page(status: StatusCode, message: &str) -> Response {
    (status, render(View::Error { message })).into_response()
}
