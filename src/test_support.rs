//! In-process stand-ins for the Spotify accounts service and Web API, plus
//! helpers to wire the app against them.

use crate::api::AppState;
use crate::config::{Config, Credentials};
use crate::models::Token;
use crate::services::{Recommender, SpotifyClient, TokenManager};
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const GOOD_CODE: &str = "good-code";
pub const GOOD_ACCESS: &str = "good-access";
pub const GOOD_REFRESH: &str = "good-refresh";
/// Refresh token that is rotated on first use; replays of it are rejected
pub const ROTATING_REFRESH: &str = "rotating-refresh";
pub const ROTATED_ACCESS: &str = "rotated-access";
/// Authorization code answered with a lifetime no clock can represent
pub const HUGE_LIFETIME_CODE: &str = "huge-lifetime";
/// Authorization code answered as if the client secret were wrong
pub const BAD_CLIENT_CODE: &str = "bad-client";
pub const MISSING_TRACK_ID: &str = "0000000000000000000000";
pub const MALFORMED_TRACK_ID: &str = "1111111111111111111111";

#[derive(Debug, Default)]
pub struct Hits {
    pub token: AtomicUsize,
    pub api: AtomicUsize,
}

#[derive(Clone)]
struct FakeState {
    hits: Arc<Hits>,
    last_query: Arc<Mutex<Option<HashMap<String, String>>>>,
    top_track_count: Arc<AtomicUsize>,
    rate_limited: Arc<AtomicBool>,
    rotations: Arc<AtomicUsize>,
}

pub struct FakeSpotify {
    pub base_url: String,
    pub hits: Arc<Hits>,
    /// Query string of the most recent Web API call
    pub last_query: Arc<Mutex<Option<HashMap<String, String>>>>,
    state: FakeState,
}

impl FakeSpotify {
    pub async fn start() -> Self {
        let state = FakeState {
            hits: Arc::new(Hits::default()),
            last_query: Arc::new(Mutex::new(None)),
            top_track_count: Arc::new(AtomicUsize::new(usize::MAX)),
            rate_limited: Arc::new(AtomicBool::new(false)),
            rotations: Arc::new(AtomicUsize::new(0)),
        };

        let app = Router::new()
            .route("/api/token", post(token))
            .route("/v1/me/top/tracks", get(top_tracks))
            .route("/v1/recommendations", get(recommendations))
            .route("/v1/audio-analysis/:id", get(audio_analysis))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            hits: state.hits.clone(),
            last_query: state.last_query.clone(),
            state,
        }
    }

    /// Cap how many top tracks the user appears to have
    pub fn set_top_track_count(&self, count: usize) {
        self.state.top_track_count.store(count, Ordering::SeqCst);
    }

    pub fn set_rate_limited(&self, limited: bool) {
        self.state.rate_limited.store(limited, Ordering::SeqCst);
    }
}

pub fn test_config(base_url: &str) -> Config {
    Config {
        credentials: Credentials {
            client_id: "test-client".to_string(),
            client_secret: "test-secret".to_string(),
            redirect_uri: "http://localhost:5001/callback".to_string(),
            scope: "user-top-read".to_string(),
        },
        accounts_url: base_url.to_string(),
        api_url: format!("{}/v1", base_url),
        server_host: "127.0.0.1".to_string(),
        server_port: 0,
        http_timeout: std::time::Duration::from_secs(5),
        session_cookie_secure: false,
    }
}

pub fn test_state(fake: &FakeSpotify) -> Arc<AppState> {
    let config = test_config(&fake.base_url);
    let client = crate::services::http_client(config.http_timeout).unwrap();
    let tokens = Arc::new(TokenManager::new(&config, client.clone()).unwrap());
    let spotify = SpotifyClient::new(config.api_url.clone(), client);

    Arc::new(AppState {
        tokens: tokens.clone(),
        recommender: Arc::new(Recommender::new(tokens, spotify)),
        session_cookie_secure: config.session_cookie_secure,
    })
}

pub fn valid_token() -> Token {
    Token {
        access_token: GOOD_ACCESS.to_string(),
        refresh_token: Some(GOOD_REFRESH.to_string()),
        expires_at: Utc::now() + Duration::hours(1),
        scope: "user-top-read".to_string(),
    }
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn token_payload(access_token: &str, refresh_token: Option<&str>) -> Value {
    let mut payload = json!({
        "access_token": access_token,
        "token_type": "Bearer",
        "expires_in": 3600,
        "scope": "user-top-read",
    });
    if let Some(refresh_token) = refresh_token {
        payload["refresh_token"] = json!(refresh_token);
    }
    payload
}

fn invalid_grant(description: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": "invalid_grant", "error_description": description })),
    )
        .into_response()
}

async fn token(
    State(fake): State<FakeState>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    fake.hits.token.fetch_add(1, Ordering::SeqCst);

    let has_basic_auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("Basic "));
    if !has_basic_auth {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "invalid_client" }))).into_response();
    }

    let field = |name: &str| form.get(name).map(String::as_str).unwrap_or_default();

    match field("grant_type") {
        "authorization_code" => match field("code") {
            GOOD_CODE => Json(token_payload(GOOD_ACCESS, Some(GOOD_REFRESH))).into_response(),
            "malformed" => Json(json!({ "token_type": "Bearer" })).into_response(),
            HUGE_LIFETIME_CODE => {
                let mut payload = token_payload(GOOD_ACCESS, Some(GOOD_REFRESH));
                payload["expires_in"] = json!(i64::MAX);
                Json(payload).into_response()
            }
            BAD_CLIENT_CODE => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "invalid_client", "error_description": "Invalid client secret" })),
            )
                .into_response(),
            _ => invalid_grant("Invalid authorization code"),
        },
        "refresh_token" => match field("refresh_token") {
            GOOD_REFRESH => Json(token_payload("refreshed-access", None)).into_response(),
            ROTATING_REFRESH => {
                if fake.rotations.fetch_add(1, Ordering::SeqCst) == 0 {
                    Json(token_payload(ROTATED_ACCESS, Some("rotated-refresh"))).into_response()
                } else {
                    // Lands after the first caller has stored the rotated token
                    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
                    invalid_grant("Refresh token revoked")
                }
            }
            _ => invalid_grant("Refresh token revoked"),
        },
        _ => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "unsupported_grant_type" })),
        )
            .into_response(),
    }
}

/// Shared bookkeeping for Web API routes. Returns an error response when the
/// call should be refused.
fn api_call(fake: &FakeState, headers: &HeaderMap, query: HashMap<String, String>) -> Option<Response> {
    fake.hits.api.fetch_add(1, Ordering::SeqCst);
    *fake.last_query.lock().unwrap() = Some(query);

    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or_default();

    if bearer.is_empty() || bearer == "revoked" {
        return Some(
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": { "status": 401, "message": "The access token expired" } })),
            )
                .into_response(),
        );
    }

    if fake.rate_limited.load(Ordering::SeqCst) {
        return Some(
            (
                StatusCode::TOO_MANY_REQUESTS,
                [(header::RETRY_AFTER, "3")],
                Json(json!({ "error": { "status": 429, "message": "API rate limit exceeded" } })),
            )
                .into_response(),
        );
    }

    None
}

fn track_json(id: String, name: String, artists: &[&str]) -> Value {
    json!({
        "id": id,
        "name": name,
        "artists": artists.iter().map(|a| json!({ "name": a })).collect::<Vec<_>>(),
    })
}

fn limit_param(query: &HashMap<String, String>) -> usize {
    query.get("limit").and_then(|l| l.parse().ok()).unwrap_or(20)
}

async fn top_tracks(
    State(fake): State<FakeState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let limit = limit_param(&query);
    if let Some(refused) = api_call(&fake, &headers, query) {
        return refused;
    }

    let count = limit.min(fake.top_track_count.load(Ordering::SeqCst));
    let items: Vec<Value> = (0..count)
        .map(|i| track_json(format!("top{}", i), format!("Top Track {}", i), &["Top Artist"]))
        .collect();

    Json(json!({ "items": items, "total": count })).into_response()
}

async fn recommendations(
    State(fake): State<FakeState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let limit = limit_param(&query);
    if let Some(refused) = api_call(&fake, &headers, query) {
        return refused;
    }

    // One entry without artists, which the client has to drop
    let mut tracks = vec![track_json("broken".to_string(), "No Artist".to_string(), &[])];
    tracks.extend((0..limit).map(|i| {
        track_json(
            format!("rec{}", i),
            format!("Recommended {}", i),
            &["Band A", "Band B"],
        )
    }));

    Json(json!({ "tracks": tracks, "seeds": [] })).into_response()
}

async fn audio_analysis(
    State(fake): State<FakeState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if let Some(refused) = api_call(&fake, &headers, HashMap::new()) {
        return refused;
    }

    match id.as_str() {
        MISSING_TRACK_ID => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": { "status": 404, "message": "analysis not found" } })),
        )
            .into_response(),
        MALFORMED_TRACK_ID => Json(json!({ "meta": {} })).into_response(),
        _ => Json(json!({
            "meta": { "analyzer_version": "4.0.0" },
            "track": { "tempo": 120.0, "key": 5 },
            "segments": [],
        }))
        .into_response(),
    }
}
