pub mod recommendation;
pub mod session;
pub mod token;

pub use recommendation::{
    RecommendationCriteria, RecommendationRequest, RecommendationResult, SeedQuery, TimeRange,
    TrackSeed, TrackSummary,
};
pub use session::SessionId;
pub use token::{Token, TokenState};
