// Main entry point for the upscaler-server application.
// Sets up logging, the upload directory and the model cache,
// configures the Axum router, and starts the HTTP server.

mod config;
mod enhancer;
mod models;
mod shutdown_signal;
mod storage;
mod upscaler;
mod web;

use clap::Parser;
use config::AppConfig;
use shutdown_signal::shutdown_signal;
use std::sync::Arc;
use storage::UploadStore;
use upscaler::UpscalerCache;
use web::{AppState, create_app, create_listener};

#[tokio::main]
async fn main() {
    // Parse command line args and environment variables
    let config = AppConfig::parse();

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("AI Upscaler API starting...");

    let store = UploadStore::open(&config.upload_dir).unwrap_or_else(|err| {
        tracing::error!(
            "FATAL: Failed to create upload directory {}: {}",
            config.upload_dir.display(),
            err
        );
        eprintln!("FATAL: Upload directory unavailable. See logs for details. Exiting.");
        std::process::exit(1);
    });
    tracing::info!("Upload directory: {}", store.dir().display());

    let backend = config.backend();
    let gpu_available = backend.gpu_available();
    tracing::info!("Inference backend: {}", backend.name());
    tracing::info!("GPU available: {}", gpu_available);

    let limits = config.upload_limits();
    tracing::info!(
        "Accepting {} up to {} bytes",
        limits.allowed_extensions.join(", "),
        limits.max_file_size
    );

    let state = Arc::new(AppState {
        cache: UpscalerCache::new(backend),
        store,
        limits,
        gpu_available,
    });

    // Warm up requested models; a failure here only means the first request loads it
    for key in &config.preload {
        match state.cache.get_or_load(*key).await {
            Ok(_) => tracing::info!("Preloaded {}", key),
            Err(e) => tracing::warn!("Failed to preload {}: {}", key, e),
        }
    }

    let app = create_app(state.clone(), &config.cors_origins());
    tracing::info!("Axum router configured.");

    let listener = match create_listener(&config.host, config.port).await {
        Ok((addr, l)) => {
            tracing::info!("Server successfully bound. Listening on {}", addr);
            l
        }
        Err(e) => {
            tracing::error!("FATAL: Failed to bind server: {}", e);
            eprintln!("FATAL: Could not bind server. Error: {}. Exiting.", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("Server run error: {}", e);
        eprintln!("ERROR: Server shut down unexpectedly. Error: {}", e);
    }

    tracing::info!("Shutting down AI Upscaler API...");
    state.cache.clear().await;
}
