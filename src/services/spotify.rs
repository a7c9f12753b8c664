use crate::error::ProviderError;
use crate::models::{RecommendationRequest, RecommendationResult, SeedQuery, TrackSummary};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct SpotifyClient {
    base_url: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct TopTracksResponse {
    items: Vec<SpotifyTrack>,
}

#[derive(Debug, Deserialize)]
struct RecommendationsResponse {
    tracks: Vec<SpotifyTrack>,
}

#[derive(Debug, Deserialize)]
struct SpotifyTrack {
    id: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    artists: Vec<SpotifyArtist>,
}

#[derive(Debug, Deserialize)]
struct SpotifyArtist {
    #[serde(default)]
    name: String,
}

impl SpotifyTrack {
    /// Local files and unavailable tracks come back without an id or with
    /// blank metadata; those are unusable as seeds or results.
    fn into_summary(self) -> Option<TrackSummary> {
        let Some(id) = self.id.filter(|id| !id.is_empty()) else {
            tracing::warn!("Dropping track {:?} with no id", self.name);
            return None;
        };
        let artists: Vec<String> = self
            .artists
            .into_iter()
            .map(|a| a.name)
            .filter(|name| !name.is_empty())
            .collect();

        if self.name.is_empty() || artists.is_empty() {
            tracing::warn!("Dropping track {} with missing name or artists", id);
            return None;
        }

        Some(TrackSummary {
            id,
            name: self.name,
            artists,
        })
    }
}

impl SpotifyClient {
    pub fn new(base_url: String, client: Client) -> Self {
        Self { base_url, client }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        access_token: &str,
        path: &str,
        params: &[(String, String)],
    ) -> Result<T, ProviderError> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("Spotify GET {} {:?}", url, params);

        let response = self
            .client
            .get(&url)
            .bearer_auth(access_token)
            .query(params)
            .send()
            .await?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await?;

        if !status.is_success() {
            if let Some(secs) = retry_after {
                tracing::warn!("Spotify asked us to retry {} after {}s", path, secs);
            }
            return Err(ProviderError::classify(status.as_u16(), &body));
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                "Unexpected Spotify payload from {}: {} - {}",
                path,
                e,
                body.chars().take(200).collect::<String>()
            );
            ProviderError::MalformedResponse(format!("{}: {}", path, e))
        })
    }

    pub async fn top_tracks(
        &self,
        access_token: &str,
        query: &SeedQuery,
    ) -> Result<Vec<TrackSummary>, ProviderError> {
        let params = vec![
            ("limit".to_string(), query.limit.to_string()),
            ("time_range".to_string(), query.time_range.as_str().to_string()),
        ];

        let data: TopTracksResponse = self.get_json(access_token, "/me/top/tracks", &params).await?;

        let tracks: Vec<TrackSummary> = data
            .items
            .into_iter()
            .filter_map(SpotifyTrack::into_summary)
            .take(query.limit as usize)
            .collect();
        tracing::debug!("Fetched {} top tracks", tracks.len());

        Ok(tracks)
    }

    pub async fn recommendations(
        &self,
        access_token: &str,
        request: &RecommendationRequest,
    ) -> Result<RecommendationResult, ProviderError> {
        let data: RecommendationsResponse = self
            .get_json(access_token, "/recommendations", &request.query_pairs())
            .await?;

        Ok(data
            .tracks
            .into_iter()
            .filter_map(SpotifyTrack::into_summary)
            .take(request.limit as usize)
            .collect())
    }

    /// Raw audio analysis document for one track. Only checked for the
    /// top-level sections every analysis carries.
    pub async fn audio_analysis(
        &self,
        access_token: &str,
        track_id: &str,
    ) -> Result<Value, ProviderError> {
        let path = format!("/audio-analysis/{}", track_id);
        let analysis: Value = self.get_json(access_token, &path, &[]).await?;

        let has_sections = analysis.get("track").is_some_and(Value::is_object)
            && analysis.get("segments").is_some_and(Value::is_array);
        if !has_sections {
            return Err(ProviderError::MalformedResponse(format!(
                "{}: missing track or segments",
                path
            )));
        }

        Ok(analysis)
    }
}
