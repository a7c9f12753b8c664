use crate::error::{AppError, AuthError, ProviderError, Result};
use crate::models::{RecommendationCriteria, RecommendationResult, SessionId, TimeRange, TrackSummary};
use crate::services::request_builder::{
    build_recommendation_request, build_seed_query, validate_criteria, validate_track_id,
};
use crate::services::{SpotifyClient, TokenManager};
use serde_json::Value;
use std::sync::Arc;

pub const DASHBOARD_SEED_COUNT: u32 = 5;
pub const CUSTOM_SEED_COUNT: u32 = 2;
pub const RESULT_LIMIT: u32 = 10;

#[derive(Debug, Clone)]
pub struct Recommendations {
    pub seeds: Vec<TrackSummary>,
    pub tracks: RecommendationResult,
}

/// Runs the token -> top tracks -> recommendations pipeline for a session
pub struct Recommender {
    tokens: Arc<TokenManager>,
    spotify: SpotifyClient,
}

impl Recommender {
    pub fn new(tokens: Arc<TokenManager>, spotify: SpotifyClient) -> Self {
        Self { tokens, spotify }
    }

    /// Recommendations seeded from the user's top five tracks
    pub async fn dashboard(&self, session: SessionId) -> Result<Recommendations> {
        self.recommend(session, DASHBOARD_SEED_COUNT, None).await
    }

    /// Recommendations tuned by user-supplied audio-feature targets.
    /// Criteria are checked before anything leaves the process.
    pub async fn custom(
        &self,
        session: SessionId,
        criteria: &RecommendationCriteria,
    ) -> Result<Recommendations> {
        validate_criteria(criteria)?;
        self.recommend(session, CUSTOM_SEED_COUNT, Some(criteria)).await
    }

    pub async fn audio_analysis(&self, session: SessionId, track_id: &str) -> Result<Value> {
        validate_track_id(track_id)?;

        let access_token = self.tokens.valid_access_token(session).await?;
        let result = self.spotify.audio_analysis(&access_token, track_id).await;
        self.checked(session, &access_token, result).await
    }

    async fn recommend(
        &self,
        session: SessionId,
        seed_count: u32,
        criteria: Option<&RecommendationCriteria>,
    ) -> Result<Recommendations> {
        let seed_query = build_seed_query(seed_count, TimeRange::MediumTerm)?;
        let access_token = self.tokens.valid_access_token(session).await?;

        let result = self.spotify.top_tracks(&access_token, &seed_query).await;
        let seeds = self.checked(session, &access_token, result).await?;

        let track_seeds: Vec<_> = seeds.iter().map(TrackSummary::seed).collect();
        let request = build_recommendation_request(&track_seeds, criteria, RESULT_LIMIT)?;

        let result = self.spotify.recommendations(&access_token, &request).await;
        let tracks = self.checked(session, &access_token, result).await?;

        tracing::info!(
            "Session {} got {} recommendations from {} seeds",
            session,
            tracks.len(),
            track_seeds.len()
        );

        Ok(Recommendations { seeds, tracks })
    }

    /// A rejected access token means the session is no longer authorized,
    /// so it is logged out and reported as an auth failure. A token stored
    /// since `access_token` was read (a fresh login) is kept.
    async fn checked<T>(
        &self,
        session: SessionId,
        access_token: &str,
        result: std::result::Result<T, ProviderError>,
    ) -> Result<T> {
        match result {
            Err(ProviderError::Unauthorized(message)) => {
                tracing::warn!("Spotify rejected token for session {}: {}", session, message);
                self.tokens.forget_if_current(session, access_token).await;
                Err(AuthError::Expired.into())
            }
            other => other.map_err(AppError::from),
        }
    }
}
