// HTTP API for the upscaler
// Handles upload validation, upscaling, downloads and health checks

mod app;
mod cors;
mod error;
mod extract_request_data;
mod handlers;
mod listeners;
mod models;

pub use app::create_app;
pub use listeners::create_listener;

use crate::storage::UploadStore;
use crate::upscaler::UpscalerCache;
use std::sync::Arc;

// Room for multipart boundaries and the small form fields on top of the file
pub const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Upload constraints checked before anything touches the disk.
#[derive(Debug, Clone)]
pub struct UploadLimits {
    pub max_file_size: usize,
    /// Lower-case extensions without the dot.
    pub allowed_extensions: Vec<String>,
}

pub struct AppState {
    pub cache: UpscalerCache,
    pub store: UploadStore,
    pub limits: UploadLimits,
    pub gpu_available: bool,
}

pub type SharedState = Arc<AppState>;
