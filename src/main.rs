mod api;
mod config;
mod error;
mod models;
mod services;
mod views;

#[cfg(test)]
mod test_support;

use crate::api::AppState;
use crate::config::Config;
use crate::services::{Recommender, SpotifyClient, TokenManager};
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,vibe_tuner=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!(
        "Configuration loaded (client {}, redirect {})",
        config.credentials.client_id,
        config.credentials.redirect_uri
    );

    // Initialize services
    let http_client = services::http_client(config.http_timeout)?;
    let token_manager = Arc::new(TokenManager::new(&config, http_client.clone())?);
    let spotify_client = SpotifyClient::new(config.api_url.clone(), http_client);
    let recommender = Arc::new(Recommender::new(token_manager.clone(), spotify_client));

    let app_state = Arc::new(AppState {
        tokens: token_manager,
        recommender,
        session_cookie_secure: config.session_cookie_secure,
    });

    // Build router
    let app = api::router(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new());

    // Start server
    let addr = format!("{}:{}", config.server_host, config.server_port);
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
