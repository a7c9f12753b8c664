use crate::api::middleware::RequireToken;
use crate::api::AppState;
use crate::error::Result;
use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;

pub fn analysis_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/track-audio-analysis/:track_id", get(track_audio_analysis))
        .route("/health", get(health))
}

async fn track_audio_analysis(
    State(state): State<Arc<AppState>>,
    RequireToken(session): RequireToken,
    Path(track_id): Path<String>,
) -> Result<Json<Value>> {
    let analysis = state.recommender.audio_analysis(session, &track_id).await?;
    Ok(Json(analysis))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
