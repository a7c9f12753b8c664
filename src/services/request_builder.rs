use crate::error::ValidationError;
use crate::models::{RecommendationCriteria, RecommendationRequest, SeedQuery, TimeRange, TrackSeed};
use validator::Validate;

/// Spotify caps both the top-tracks seed lookup and the combined seed count
/// of a recommendation request at five.
pub const MAX_SEEDS: usize = 5;
pub const MAX_RESULT_LIMIT: u32 = 100;

const MAX_GENRE_LEN: usize = 64;

pub fn build_seed_query(limit: u32, time_range: TimeRange) -> Result<SeedQuery, ValidationError> {
    if limit == 0 || limit as usize > MAX_SEEDS {
        return Err(ValidationError::OutOfRange {
            field: "limit".to_string(),
            value: f64::from(limit),
            min: 1.0,
            max: MAX_SEEDS as f64,
        });
    }

    Ok(SeedQuery { limit, time_range })
}

pub fn build_recommendation_request(
    seeds: &[TrackSeed],
    criteria: Option<&RecommendationCriteria>,
    result_limit: u32,
) -> Result<RecommendationRequest, ValidationError> {
    if seeds.is_empty() {
        return Err(ValidationError::MissingSeeds);
    }

    if let Some(criteria) = criteria {
        validate_criteria(criteria)?;
    }

    let seed_genres: Vec<String> = criteria.map(|c| vec![c.genre.clone()]).unwrap_or_default();
    let seed_count = seeds.len() + seed_genres.len();
    if seed_count > MAX_SEEDS {
        return Err(ValidationError::TooManySeeds {
            count: seed_count,
            max: MAX_SEEDS,
        });
    }

    if result_limit == 0 || result_limit > MAX_RESULT_LIMIT {
        return Err(ValidationError::OutOfRange {
            field: "limit".to_string(),
            value: f64::from(result_limit),
            min: 1.0,
            max: f64::from(MAX_RESULT_LIMIT),
        });
    }

    Ok(RecommendationRequest {
        seed_tracks: seeds.iter().map(|s| s.track_id.clone()).collect(),
        seed_genres,
        limit: result_limit,
        criteria: criteria.cloned(),
    })
}

/// Check criteria against the schema declared on [`RecommendationCriteria`].
/// Values are rejected, never clamped.
pub fn validate_criteria(criteria: &RecommendationCriteria) -> Result<(), ValidationError> {
    // Range checks pass NaN through, so non-finite values are caught first
    for (field, value) in criteria.targets() {
        if !value.is_finite() {
            return Err(ValidationError::OutOfRange {
                field: field.to_string(),
                value,
                min: f64::NAN,
                max: f64::NAN,
            });
        }
    }

    if let Err(errors) = criteria.validate() {
        let field_errors = errors.field_errors();

        if field_errors.contains_key("genre") {
            return Err(ValidationError::InvalidGenre(criteria.genre.clone()));
        }

        for (field, value) in criteria.targets() {
            if let Some(errs) = field_errors.get(field) {
                let param = |name: &str| {
                    errs.first()
                        .and_then(|e| e.params.get(name))
                        .and_then(|v| v.as_f64())
                        .unwrap_or(f64::NAN)
                };
                return Err(ValidationError::OutOfRange {
                    field: field.to_string(),
                    value,
                    min: param("min"),
                    max: param("max"),
                });
            }
        }

        return Err(ValidationError::Malformed(errors.to_string()));
    }

    if !is_genre_seed(&criteria.genre) {
        return Err(ValidationError::InvalidGenre(criteria.genre.clone()));
    }

    Ok(())
}

fn is_genre_seed(genre: &str) -> bool {
    !genre.is_empty()
        && genre.len() <= MAX_GENRE_LEN
        && genre
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Spotify track ids are 22 base62 characters
pub fn validate_track_id(track_id: &str) -> Result<(), ValidationError> {
    if track_id.len() == 22 && track_id.chars().all(|c| c.is_ascii_alphanumeric()) {
        Ok(())
    } else {
        Err(ValidationError::InvalidTrackId(track_id.to_string()))
    }
}
