// API handlers for the web server

use super::{
    SharedState,
    error::ApiError,
    extract_request_data::{extract_upscale_form, validate_image},
    models::*,
};
use crate::models::{ModelKey, ModelType, ScaleRate, UpscaleOutcome};
use crate::storage::UploadSlot;
use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, State},
    http::header,
    response::{IntoResponse, Response},
};
use axum_extra::TypedHeader;
use headers::{ContentLength, ContentType};
use tokio_util::io::ReaderStream;
use tracing::{error, info};

// --- GET /api/health ---
pub async fn health_check(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        gpu_available: state.gpu_available,
        loaded_models: state.cache.loaded_keys().await,
    })
}

// --- POST /api/upscale ---
// Multipart form: file, model_type ('photo' | 'anime'), scale_rate (2 | 4)
pub async fn upscale_image(
    State(state): State<SharedState>,
    multipart: Multipart,
) -> Result<Json<UpscaleResponse>, ApiError> {
    let form = extract_upscale_form(multipart, &state.limits).await?;

    let ext = validate_image(
        form.file_name.as_deref(),
        form.file_data.len(),
        &state.limits,
    )?;
    let model_type = form
        .model_type
        .parse::<ModelType>()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let scale = ScaleRate::try_from(form.scale_rate)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let slot = state.store.allocate(&ext);

    match run_upscale(&state, &slot, ModelKey::new(model_type, scale), form.file_data).await {
        Ok(outcome) => {
            // Only the result is kept for download
            state.store.remove_if_exists(&slot.input_path).await;

            Ok(Json(UpscaleResponse::new(
                slot.output_filename,
                &outcome,
                model_type,
                scale,
            )))
        }
        Err(err) => {
            state.store.remove_if_exists(&slot.input_path).await;
            state.store.remove_if_exists(&slot.output_path).await;
            error!("Upscale request {} failed: {}", slot.file_id, err.message());
            Err(err)
        }
    }
}

async fn run_upscale(
    state: &SharedState,
    slot: &UploadSlot,
    key: ModelKey,
    file_data: Vec<u8>,
) -> Result<UpscaleOutcome, ApiError> {
    tokio::fs::write(&slot.input_path, file_data).await?;
    info!("Saved input: {}", slot.input_filename);

    let upscaler = state.cache.get_or_load(key).await?;

    let input_path = slot.input_path.clone();
    let output_path = slot.output_path.clone();
    let outcome = tokio::task::spawn_blocking(move || upscaler.upscale(&input_path, &output_path))
        .await
        .map_err(|e| ApiError::upscaling_failed(format!("upscale task failed: {}", e)))??;

    info!(
        "Upscaled {} with {}: {}x{} -> {}x{} in {:.2}s",
        slot.file_id,
        key,
        outcome.original_size.0,
        outcome.original_size.1,
        outcome.upscaled_size.0,
        outcome.upscaled_size.1,
        outcome.processing_time
    );

    Ok(outcome)
}

// --- GET /api/download/{filename} ---
pub async fn download_file(
    State(state): State<SharedState>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    let not_found = || ApiError::NotFound("File not found".to_string());

    let path = state.store.resolve(&filename).ok_or_else(not_found)?;
    let file = tokio::fs::File::open(&path).await.map_err(|_| not_found())?;
    let meta = file.metadata().await.map_err(|e| {
        ApiError::InternalServerError(format!("Failed to read {}: {}", filename, e))
    })?;
    if !meta.is_file() {
        return Err(not_found());
    }

    let disposition = format!(
        "attachment; filename=\"{}\"",
        filename.replace('\\', "\\\\").replace('"', "\\\"")
    );

    Ok((
        TypedHeader(ContentType::from(mime::IMAGE_PNG)),
        TypedHeader(ContentLength(meta.len())),
        [(header::CONTENT_DISPOSITION, disposition)],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response())
}
