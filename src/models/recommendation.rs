use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeRange {
    ShortTerm,
    #[default]
    MediumTerm,
    LongTerm,
}

impl TimeRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::ShortTerm => "short_term",
            TimeRange::MediumTerm => "medium_term",
            TimeRange::LongTerm => "long_term",
        }
    }
}

/// Parameters for the user's top-tracks lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedQuery {
    pub limit: u32,
    pub time_range: TimeRange,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackSeed {
    pub track_id: String,
}

/// Audio-feature targets submitted through the recommend form.
///
/// The derive attributes are the single description of the accepted ranges:
/// normalized features live in `[0, 1]`, popularity is Spotify's 0-100 score
/// and tempo is in BPM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct RecommendationCriteria {
    #[validate(length(min = 1, max = 64))]
    pub genre: String,
    #[validate(range(min = 0.0, max = 1.0))]
    pub energy: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub danceability: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub valence: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub acousticness: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub instrumentalness: f64,
    #[validate(range(max = 100))]
    pub popularity: u32,
    #[validate(range(min = 0.0, max = 250.0))]
    pub tempo: f64,
}

impl RecommendationCriteria {
    /// Numeric targets in form order, keyed by field name
    pub fn targets(&self) -> [(&'static str, f64); 7] {
        [
            ("energy", self.energy),
            ("danceability", self.danceability),
            ("valence", self.valence),
            ("acousticness", self.acousticness),
            ("instrumentalness", self.instrumentalness),
            ("popularity", f64::from(self.popularity)),
            ("tempo", self.tempo),
        ]
    }
}

/// A validated outbound recommendation query. Only the request builder
/// constructs these.
#[derive(Debug, Clone, PartialEq)]
pub struct RecommendationRequest {
    pub seed_tracks: Vec<String>,
    pub seed_genres: Vec<String>,
    pub limit: u32,
    pub criteria: Option<RecommendationCriteria>,
}

impl RecommendationRequest {
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut params = vec![
            ("seed_tracks".to_string(), self.seed_tracks.join(",")),
            ("limit".to_string(), self.limit.to_string()),
        ];

        if !self.seed_genres.is_empty() {
            params.push(("seed_genres".to_string(), self.seed_genres.join(",")));
        }

        if let Some(criteria) = &self.criteria {
            for (name, value) in criteria.targets() {
                params.push((format!("target_{}", name), value.to_string()));
            }
        }

        params
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackSummary {
    pub id: String,
    pub name: String,
    pub artists: Vec<String>,
}

impl TrackSummary {
    pub fn seed(&self) -> TrackSeed {
        TrackSeed {
            track_id: self.id.clone(),
        }
    }
}

pub type RecommendationResult = Vec<TrackSummary>;
