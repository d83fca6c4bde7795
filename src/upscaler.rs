// Upscaler instances and the cache that keeps them loaded.
// Loading a network is expensive, so each (model family, scale) pair is
// built once and reused for every later request. Nothing is ever evicted.

use crate::enhancer::{EnhanceError, Enhancer, EnhancerLoader};
use crate::models::{ModelKey, UpscaleOutcome};
use image::{ImageFormat, ImageReader, imageops::FilterType};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info};

#[derive(Debug)]
pub enum UpscaleError {
    /// Input could not be decoded as an image. Caused by the client's upload.
    UnreadableImage { path: String, reason: String },
    Enhance(EnhanceError),
    /// Result could not be encoded or written.
    Encode(String),
    Io(std::io::Error),
}

impl fmt::Display for UpscaleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpscaleError::UnreadableImage { path, reason } => {
                write!(f, "Failed to read image: {path} ({reason})")
            }
            UpscaleError::Enhance(e) => write!(f, "{e}"),
            UpscaleError::Encode(msg) => write!(f, "Failed to write output image: {msg}"),
            UpscaleError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for UpscaleError {}

impl From<EnhanceError> for UpscaleError {
    fn from(err: EnhanceError) -> Self {
        UpscaleError::Enhance(err)
    }
}

impl From<std::io::Error> for UpscaleError {
    fn from(err: std::io::Error) -> Self {
        UpscaleError::Io(err)
    }
}

/// A loaded network bound to the scale it was requested for.
pub struct Upscaler {
    key: ModelKey,
    enhancer: Arc<dyn Enhancer>,
}

impl Upscaler {
    pub fn new(key: ModelKey, enhancer: Arc<dyn Enhancer>) -> Self {
        Self { key, enhancer }
    }

    /// Reads `input_path`, enlarges it and writes a PNG to `output_path`.
    ///
    /// The network always runs at its native factor; when the requested
    /// scale is smaller the result is resized down to exactly
    /// `original * scale` with Lanczos3.
    ///
    /// Blocking. Call from a blocking thread.
    pub fn upscale(
        &self,
        input_path: &Path,
        output_path: &Path,
    ) -> Result<UpscaleOutcome, UpscaleError> {
        let start = Instant::now();

        let image = ImageReader::open(input_path)?
            .with_guessed_format()?
            .decode()
            .map_err(|e| UpscaleError::UnreadableImage {
                path: input_path.display().to_string(),
                reason: e.to_string(),
            })?;

        let (original_w, original_h) = (image.width(), image.height());
        debug!("Original size: {}x{}", original_w, original_h);

        debug!("Upscaling with {}...", self.enhancer.name());
        let mut output = self.enhancer.enhance(&image)?;
        debug!("Enhanced to: {}x{}", output.width(), output.height());

        let factor = self.key.scale.factor();
        if factor != self.enhancer.native_scale() {
            let target_w = original_w * factor;
            let target_h = original_h * factor;
            output = output.resize_exact(target_w, target_h, FilterType::Lanczos3);
            debug!("Resized to {}x: {}x{}", factor, target_w, target_h);
        }

        output
            .save_with_format(output_path, ImageFormat::Png)
            .map_err(|e| UpscaleError::Encode(e.to_string()))?;

        let processing_time = start.elapsed().as_secs_f64();
        info!("Upscaling complete ({}) in {:.2}s", self.key, processing_time);

        Ok(UpscaleOutcome {
            original_size: (original_w, original_h),
            upscaled_size: (output.width(), output.height()),
            processing_time,
        })
    }
}

type Slot = Arc<OnceCell<Arc<Upscaler>>>;

/// Unbounded cache of upscalers keyed by (model family, scale).
///
/// Every key gets its own slot. The map lock is only held to find or
/// create a slot, so a slow load blocks nothing but the requests waiting
/// for that same key.
pub struct UpscalerCache {
    loader: Arc<dyn EnhancerLoader>,
    upscalers: Mutex<HashMap<ModelKey, Slot>>,
}

impl UpscalerCache {
    pub fn new(loader: impl EnhancerLoader + 'static) -> Self {
        Self {
            loader: Arc::new(loader),
            upscalers: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cached upscaler for `key`, loading it on first use.
    ///
    /// Concurrent first requests for a key wait for one load instead of
    /// each loading the model. A failed load leaves the slot empty and the
    /// next request tries again.
    pub async fn get_or_load(&self, key: ModelKey) -> Result<Arc<Upscaler>, EnhanceError> {
        let slot = self.upscalers.lock().await.entry(key).or_default().clone();

        let upscaler = slot
            .get_or_try_init(|| async {
                info!("Loading upscaler {}", key);
                let loader = self.loader.clone();
                let enhancer = tokio::task::spawn_blocking(move || loader.load(key.model_type))
                    .await
                    .map_err(|e| EnhanceError::ModelLoad(format!("Model load task failed: {e}")))??;
                Ok::<_, EnhanceError>(Arc::new(Upscaler::new(key, enhancer)))
            })
            .await?;

        Ok(upscaler.clone())
    }

    /// Keys currently loaded, in display form, sorted.
    pub async fn loaded_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .upscalers
            .lock()
            .await
            .iter()
            .filter(|(_, slot)| slot.initialized())
            .map(|(key, _)| key.to_string())
            .collect();
        keys.sort();
        keys
    }

    /// Drops every loaded upscaler.
    pub async fn clear(&self) {
        let mut upscalers = self.upscalers.lock().await;
        let count = upscalers.values().filter(|slot| slot.initialized()).count();
        upscalers.clear();
        info!("Released {} upscaler(s)", count);
    }
}
