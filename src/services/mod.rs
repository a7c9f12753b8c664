pub mod recommender;
pub mod request_builder;
pub mod spotify;
pub mod token_manager;

pub use recommender::Recommender;
pub use spotify::SpotifyClient;
pub use token_manager::TokenManager;

use std::time::Duration;

/// Outbound client shared by the accounts and Web API calls. The timeout
/// bounds every request, including body reads.
pub fn http_client(timeout: Duration) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))
}
