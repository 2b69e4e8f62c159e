//! framelens server - video analysis over HTTP.
//!
//! Wires the local adapters (filesystem storage, ffmpeg decoder) into the
//! analysis service and serves the HTTP API.

use framelens::adapters::local::{http, FfmpegDecoder, FsAdapter};
use framelens::application::service::AnalysisService;
use framelens::config::Config;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("framelens=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true))
            .with(env_filter)
            .init();
    }
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    init_tracing();

    let config = Config::from_env();
    info!(?config, "Starting framelens");

    // 1. Adapters
    let storage = FsAdapter::new(&config.upload_dir, &config.results_dir);
    if let Err(e) = storage.ensure_dirs().await {
        error!("Failed to prepare storage directories: {}", e);
        std::process::exit(1);
    }

    // 2. Application service
    let service = Arc::new(AnalysisService::new(
        Arc::new(FfmpegDecoder::new()),
        Arc::new(storage),
        config.analysis.clone(),
        config.max_concurrent_jobs,
    ));

    // 3. HTTP layer
    let app = http::router(service).layer(http::cors_layer(&config.cors_origin));

    let listener = match tokio::net::TcpListener::bind(config.bind_address()).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", config.bind_address(), e);
            std::process::exit(1);
        }
    };
    info!("Listening at {}", config.bind_address());

    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
    };
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
    {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}
