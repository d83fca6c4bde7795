// Real-ESRGAN inference through ONNX Runtime.
//
// Both supported networks (x4plus and x4plus_anime_6B) enlarge by 4x and
// take an NCHW float tensor of RGB values in 0..1. Large images are run
// tile by tile so memory use stays bounded by the tile size.

use super::{EnhanceError, Enhancer};
use crate::models::ModelType;
use image::{RgbImage, imageops};
use ndarray::Array4;
use ort::execution_providers::{
    CPUExecutionProvider, CUDAExecutionProvider, ExecutionProvider,
};
use ort::session::{Session, builder::GraphOptimizationLevel};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{debug, info};

/// The fixed upscale factor of the Real-ESRGAN x4 networks.
pub const NATIVE_SCALE: u32 = 4;

#[derive(Debug, Clone)]
pub struct OnnxOptions {
    /// Directory holding `<model name>.onnx` files.
    pub models_dir: PathBuf,
    /// Tile edge in input pixels; 0 processes the whole image at once.
    pub tile: u32,
    /// Context pixels added around each tile and cropped off afterwards.
    pub tile_pad: u32,
}

pub struct OnnxEnhancer {
    name: String,
    tile: u32,
    tile_pad: u32,
    // `Session::run` needs exclusive access.
    session: Mutex<Session>,
}

impl OnnxEnhancer {
    pub fn load(model_type: ModelType, options: &OnnxOptions) -> Result<Self, EnhanceError> {
        let name = model_type.model_name();
        let path = options.models_dir.join(format!("{name}.onnx"));
        if !path.is_file() {
            return Err(EnhanceError::ModelNotFound(path.display().to_string()));
        }

        let device = if cuda_available() { "cuda" } else { "cpu" };
        info!(
            "Initializing Real-ESRGAN ({} model, device: {}) from {}",
            model_type,
            device,
            path.display()
        );

        let session = Session::builder()
            .map_err(|e| EnhanceError::ModelLoad(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| EnhanceError::ModelLoad(e.to_string()))?
            .with_execution_providers([
                CUDAExecutionProvider::default().build(),
                CPUExecutionProvider::default().build(),
            ])
            .map_err(|e| EnhanceError::ModelLoad(e.to_string()))?
            .commit_from_file(&path)
            .map_err(|e| EnhanceError::ModelLoad(e.to_string()))?;

        info!("Model loaded: {}", name);

        Ok(Self {
            name: name.to_string(),
            tile: options.tile,
            tile_pad: options.tile_pad,
            session: Mutex::new(session),
        })
    }

    fn infer(&self, image: &RgbImage) -> Result<RgbImage, EnhanceError> {
        let input_tensor = preprocess_image(image);

        let mut session = self.session.lock().map_err(|e| {
            EnhanceError::InferenceFailed(format!("Failed to acquire session lock: {e}"))
        })?;

        // Real-ESRGAN exports usually name the input 'input'
        let input_name = session
            .inputs
            .first()
            .map_or_else(|| "input".to_string(), |i| i.name.clone());

        let input_ref = ort::value::TensorRef::from_array_view(&input_tensor)
            .map_err(|e| EnhanceError::InferenceFailed(e.to_string()))?;

        let outputs = session
            .run(ort::inputs![input_name.as_str() => input_ref])
            .map_err(|e| EnhanceError::InferenceFailed(e.to_string()))?;

        postprocess_output(&outputs)
    }
}

impl Enhancer for OnnxEnhancer {
    fn name(&self) -> &str {
        &self.name
    }

    fn native_scale(&self) -> u32 {
        NATIVE_SCALE
    }

    fn enhance_rgb(&self, image: &RgbImage) -> Result<RgbImage, EnhanceError> {
        process_tiled(image, NATIVE_SCALE, self.tile, self.tile_pad, |tile| {
            self.infer(tile)
        })
    }
}

pub(super) fn cuda_available() -> bool {
    CUDAExecutionProvider::default()
        .is_available()
        .unwrap_or(false)
}

/// Runs `run` over `image` tile by tile and stitches the results.
///
/// Each tile is extended by `tile_pad` pixels of neighbouring context
/// (clamped to the image), enlarged, and the padding is cropped off the
/// output before it is pasted at `scale` times the tile's position.
fn process_tiled<F>(
    image: &RgbImage,
    scale: u32,
    tile: u32,
    tile_pad: u32,
    mut run: F,
) -> Result<RgbImage, EnhanceError>
where
    F: FnMut(&RgbImage) -> Result<RgbImage, EnhanceError>,
{
    let (width, height) = image.dimensions();
    if tile == 0 || (width <= tile && height <= tile) {
        return run(image);
    }

    let mut output = RgbImage::new(width * scale, height * scale);
    let tiles_x = width.div_ceil(tile);
    let tiles_y = height.div_ceil(tile);

    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = tx * tile;
            let y0 = ty * tile;
            let x1 = (x0 + tile).min(width);
            let y1 = (y0 + tile).min(height);

            let px0 = x0.saturating_sub(tile_pad);
            let py0 = y0.saturating_sub(tile_pad);
            let px1 = (x1 + tile_pad).min(width);
            let py1 = (y1 + tile_pad).min(height);

            let input = imageops::crop_imm(image, px0, py0, px1 - px0, py1 - py0).to_image();
            let enlarged = run(&input)?;

            let expected = ((px1 - px0) * scale, (py1 - py0) * scale);
            if enlarged.dimensions() != expected {
                return Err(EnhanceError::PostprocessingFailed(format!(
                    "Tile output is {}x{}, expected {}x{}",
                    enlarged.width(),
                    enlarged.height(),
                    expected.0,
                    expected.1
                )));
            }

            let piece = imageops::crop_imm(
                &enlarged,
                (x0 - px0) * scale,
                (y0 - py0) * scale,
                (x1 - x0) * scale,
                (y1 - y0) * scale,
            )
            .to_image();
            imageops::replace(
                &mut output,
                &piece,
                i64::from(x0 * scale),
                i64::from(y0 * scale),
            );

            debug!("Tile {}/{}", ty * tiles_x + tx + 1, tiles_x * tiles_y);
        }
    }

    Ok(output)
}

/// Converts an RGB image to an NCHW tensor (batch=1, channels=3) in 0..1.
fn preprocess_image(image: &RgbImage) -> Array4<f32> {
    let (width, height) = image.dimensions();
    let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));

    for (x, y, pixel) in image.enumerate_pixels() {
        let [r, g, b] = pixel.0;
        tensor[[0, 0, y as usize, x as usize]] = f32::from(r) / 255.0;
        tensor[[0, 1, y as usize, x as usize]] = f32::from(g) / 255.0;
        tensor[[0, 2, y as usize, x as usize]] = f32::from(b) / 255.0;
    }

    tensor.as_standard_layout().into_owned()
}

fn postprocess_output(outputs: &ort::session::SessionOutputs<'_>) -> Result<RgbImage, EnhanceError> {
    let (_, output) = outputs
        .iter()
        .next()
        .ok_or_else(|| EnhanceError::PostprocessingFailed("No output tensor".to_string()))?;

    let (shape, data) = output
        .try_extract_tensor::<f32>()
        .map_err(|e| EnhanceError::PostprocessingFailed(e.to_string()))?;

    if shape.len() != 4 || shape[1] != 3 {
        return Err(EnhanceError::PostprocessingFailed(format!(
            "Expected a 1x3xHxW tensor, got shape {:?}",
            shape.to_vec()
        )));
    }

    let height = usize::try_from(shape[2])
        .map_err(|_| EnhanceError::PostprocessingFailed("Invalid tensor height".to_string()))?;
    let width = usize::try_from(shape[3])
        .map_err(|_| EnhanceError::PostprocessingFailed("Invalid tensor width".to_string()))?;

    tensor_to_image(data, width, height)
}

/// Planar RGB floats in 0..1 to an 8-bit image, clamping out-of-range values.
fn tensor_to_image(data: &[f32], width: usize, height: usize) -> Result<RgbImage, EnhanceError> {
    let plane = width * height;
    if data.len() < plane * 3 {
        return Err(EnhanceError::PostprocessingFailed(format!(
            "Tensor holds {} values, expected {}",
            data.len(),
            plane * 3
        )));
    }

    let to_u8 = |v: f32| (v * 255.0).clamp(0.0, 255.0).round() as u8;
    let mut pixels = Vec::with_capacity(plane * 3);
    for idx in 0..plane {
        pixels.push(to_u8(data[idx]));
        pixels.push(to_u8(data[plane + idx]));
        pixels.push(to_u8(data[2 * plane + idx]));
    }

    let width = u32::try_from(width)
        .map_err(|_| EnhanceError::PostprocessingFailed("Image width too large".to_string()))?;
    let height = u32::try_from(height)
        .map_err(|_| EnhanceError::PostprocessingFailed("Image height too large".to_string()))?;

    RgbImage::from_raw(width, height, pixels)
        .ok_or_else(|| EnhanceError::PostprocessingFailed("Failed to create image".to_string()))
}
