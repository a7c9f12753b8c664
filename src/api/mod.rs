pub mod analysis;
pub mod middleware;
pub mod pages;

use crate::services::{Recommender, TokenManager};
use axum::Router;
use std::sync::Arc;

pub struct AppState {
    pub tokens: Arc<TokenManager>,
    pub recommender: Arc<Recommender>,
    pub session_cookie_secure: bool,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(pages::page_routes())
        .merge(analysis::analysis_routes())
        .with_state(state)
}
