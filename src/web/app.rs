use super::{MULTIPART_OVERHEAD_BYTES, SharedState, cors::cors_layer, handlers};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::{
    services::ServeDir,
    trace::{DefaultMakeSpan, TraceLayer},
};
use tracing::Level;

pub fn create_app(state: SharedState, cors_origins: &[String]) -> Router {
    let body_limit = state
        .limits
        .max_file_size
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    Router::new()
        .route("/api/health", get(handlers::health_check))
        .route("/api/upscale", post(handlers::upscale_image))
        .route("/api/download/{filename}", get(handlers::download_file))
        // Results are also reachable as plain static files
        .nest_service("/files", ServeDir::new(state.store.dir()))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::new().level(Level::INFO)))
        .with_state(state)
}
