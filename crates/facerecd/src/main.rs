use std::net::SocketAddr;

use anyhow::Result;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod config;
mod engine;
mod fetch;
mod server;

use config::Config;
use server::{AppState, Readiness};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env();
    tracing::info!(
        port = config.port,
        model_dir = %config.model_dir.display(),
        detector = ?config.detector,
        upsample = config.upsample,
        jitters = config.jitters,
        tolerance = config.tolerance,
        max_dimension = config.max_dimension,
        "facerecd starting"
    );

    // Model loading happens once; a failure keeps the server up but unready.
    let readiness = Readiness::initialize(&config.extractor_options());
    if let Readiness::Unavailable { reason } = &readiness {
        tracing::warn!(%reason, "serving without face models; /health will report 503");
    }

    let state = AppState::new(readiness, &config)?;
    let app = server::create_app(state, config.body_limit_bytes());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "facerecd ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    tracing::info!("facerecd shutting down");
    Ok(())
}
