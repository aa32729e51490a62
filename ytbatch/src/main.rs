mod config;
mod engine;
mod error;
mod handlers;
mod models;
mod planner;
mod presentation;
mod progress;
mod state;
mod workers;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post}
};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::Config;
use engine::YtDlpEngine;
use handlers::{api, pages};
use presentation::WebPresentation;
use state::AppState;
use workers::batch::BatchOrchestrator;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ytbatch=info,yt_dlp=info,tower_http=debug".into())
        )
        .init();

    let config = Config::from_env();
    tracing::debug!("Loaded configuration: {:?}", config);

    if let Err(e) = tokio::fs::create_dir_all(&config.download_path).await {
        tracing::warn!(
            "Could not create download directory {}: {}",
            config.download_path.display(),
            e
        );
    }

    let engine = YtDlpEngine::new(config.yt_dlp(), config.download_options());
    match engine.client().check_binary().await {
        Ok(version) => tracing::info!("yt-dlp version: {}", version),
        Err(e) => tracing::warn!(
            "yt-dlp at {} not found or not executable: {}",
            engine.client().binary().display(),
            e
        )
    }

    let presentation = WebPresentation::new();
    let orchestrator = BatchOrchestrator::new(
        Arc::new(engine),
        Arc::new(presentation.clone()),
        config.refresh_interval
    );

    let state = AppState {
        orchestrator: Arc::new(orchestrator),
        presentation
    };

    let app = Router::new()
        .route("/", get(pages::index_page))
        .route("/api/batch", post(api::start_batch))
        .route("/api/status", get(api::status))
        .route("/api/qualities", get(api::qualities))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = config.listen_addr();
    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
