mod cancel;
mod config;
mod errors;
mod generation;
mod llm_client;
mod models;
mod routes;
mod state;
mod templates;

use anyhow::Result;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;

use crate::config::Config;
use crate::generation::references::YoutubeExtractor;
use crate::llm_client::gemini::GeminiConnector;
use crate::llm_client::throttle;
use crate::routes::build_router;
use crate::state::AppState;
use crate::templates::store::TemplateStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on malformed env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Storyforge API v{}", env!("CARGO_PKG_VERSION"));

    if config.gemini_api_key.is_none() {
        warn!("GEMINI_API_KEY not set; callers must send the x-api-key header");
    }

    // Initialize template store
    let templates = Arc::new(TemplateStore::open(&config.prompts_file).await?);

    // Initialize model connector and the shared request throttle
    let models = Arc::new(GeminiConnector::new(config.gemini_api_url.clone()));
    let throttle = throttle::from_requests_per_minute(config.requests_per_minute);
    info!(
        "Gemini connector initialized ({}; {} requests/min, {} attempts per call)",
        config.gemini_api_url,
        config.requests_per_minute,
        config.retry_attempts
    );

    // Build app state
    let state = AppState {
        config: config.clone(),
        models,
        throttle,
        templates,
        references: Arc::new(YoutubeExtractor::new()),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
