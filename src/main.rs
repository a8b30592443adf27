use anyhow::Result;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;

mod config;
mod error;
mod logging;
mod routes;
mod services;
pub mod models;

use services::insights::{OpenAiGenerator, TextGenerator};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    logging::init_logging()?;

    // Load configuration; a missing API credential aborts startup here.
    let config = config::Config::new()?;
    let max_upload_bytes = config.max_upload_bytes;

    // The text-generation client is constructed once and shared read-only
    // across requests.
    let generator: Arc<dyn TextGenerator> =
        Arc::new(OpenAiGenerator::new(&config.openai_api_key, &config.model));

    let state = Arc::new(AppState::new(config, generator));
    tracing::info!("summary generation model: {}", state.config.model);

    // Build our application with a route
    let app = Router::new()
        .merge(routes::routes())
        .merge(routes::analysis::routes(max_upload_bytes))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state);

    // Run it
    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// Application state
#[derive(Clone)]
pub struct AppState {
    config: config::Config,
    generator: Arc<dyn TextGenerator>,
}

impl AppState {
    fn new(config: config::Config, generator: Arc<dyn TextGenerator>) -> Self {
        Self { config, generator }
    }
}
