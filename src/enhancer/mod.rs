// Super-resolution backends.
// An `Enhancer` enlarges an image by its network's native factor; the
// `Upscaler` on top of it takes care of the requested scale.

mod onnx;
mod resample;

pub use onnx::{OnnxEnhancer, OnnxOptions};
pub use resample::ResampleEnhancer;

use crate::models::ModelType;
use image::{ColorType, DynamicImage, GrayImage, RgbImage, RgbaImage, imageops::FilterType};
use std::fmt;
use std::sync::Arc;

/// Errors raised while loading a model or running inference.
#[derive(Debug, Clone)]
pub enum EnhanceError {
    /// Model file not found at the expected path.
    ModelNotFound(String),
    /// ONNX Runtime failed to build a session for the model.
    ModelLoad(String),
    /// ONNX inference failed.
    InferenceFailed(String),
    /// Image could not be turned into an input tensor.
    PreprocessingFailed(String),
    /// Output tensor could not be turned back into an image.
    PostprocessingFailed(String),
}

impl fmt::Display for EnhanceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnhanceError::ModelNotFound(path) => write!(f, "Model file not found: {path}"),
            EnhanceError::ModelLoad(msg) => write!(f, "Failed to load model: {msg}"),
            EnhanceError::InferenceFailed(msg) => write!(f, "Inference failed: {msg}"),
            EnhanceError::PreprocessingFailed(msg) => write!(f, "Preprocessing failed: {msg}"),
            EnhanceError::PostprocessingFailed(msg) => {
                write!(f, "Postprocessing failed: {msg}")
            }
        }
    }
}

impl std::error::Error for EnhanceError {}

pub trait Enhancer: Send + Sync {
    /// Human-readable backend/model name for logs.
    fn name(&self) -> &str;

    /// Factor by which `enhance_rgb` enlarges its input.
    fn native_scale(&self) -> u32;

    /// Enlarges an RGB image by exactly `native_scale()`.
    fn enhance_rgb(&self, image: &RgbImage) -> Result<RgbImage, EnhanceError>;

    /// Enlarges any decoded image.
    ///
    /// Colour goes through `enhance_rgb`. An alpha channel, if present, is
    /// enlarged separately with Lanczos3 and re-attached. Grayscale input
    /// comes back as grayscale. Images with more than 8 bits per channel
    /// are reduced to 8 bits.
    fn enhance(&self, image: &DynamicImage) -> Result<DynamicImage, EnhanceError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(EnhanceError::PreprocessingFailed(
                "image has zero width or height".to_string(),
            ));
        }

        let rgb = image.to_rgb8();
        let enhanced = self.enhance_rgb(&rgb)?;

        let expected = (
            rgb.width() * self.native_scale(),
            rgb.height() * self.native_scale(),
        );
        if enhanced.dimensions() != expected {
            return Err(EnhanceError::PostprocessingFailed(format!(
                "Unexpected output size: {}x{}, expected {}x{}",
                enhanced.width(),
                enhanced.height(),
                expected.0,
                expected.1
            )));
        }

        let grayscale = matches!(
            image.color(),
            ColorType::L8 | ColorType::L16 | ColorType::La8 | ColorType::La16
        );

        if !image.color().has_alpha() {
            let output = DynamicImage::ImageRgb8(enhanced);
            return Ok(if grayscale {
                DynamicImage::ImageLuma8(output.to_luma8())
            } else {
                output
            });
        }

        let source = image.to_rgba8();
        let alpha = GrayImage::from_fn(source.width(), source.height(), |x, y| {
            image::Luma([source.get_pixel(x, y)[3]])
        });
        let alpha = image::imageops::resize(&alpha, expected.0, expected.1, FilterType::Lanczos3);

        let rgba = RgbaImage::from_fn(expected.0, expected.1, |x, y| {
            let [r, g, b] = enhanced.get_pixel(x, y).0;
            image::Rgba([r, g, b, alpha.get_pixel(x, y)[0]])
        });
        let output = DynamicImage::ImageRgba8(rgba);
        Ok(if grayscale {
            DynamicImage::ImageLumaA8(output.to_luma_alpha8())
        } else {
            output
        })
    }
}

/// Builds the enhancer for a model family. This is the expensive step the
/// upscaler cache exists to avoid repeating.
///
/// Blocking. The cache calls it from a blocking thread.
pub trait EnhancerLoader: Send + Sync {
    fn load(&self, model_type: ModelType) -> Result<Arc<dyn Enhancer>, EnhanceError>;
}

/// Which implementation backs newly loaded upscalers.
#[derive(Debug, Clone)]
pub enum Backend {
    /// Pretrained Real-ESRGAN networks run through ONNX Runtime.
    Onnx(OnnxOptions),
    /// Plain Lanczos3 enlargement, no model files required.
    Resample,
}

impl EnhancerLoader for Backend {
    fn load(&self, model_type: ModelType) -> Result<Arc<dyn Enhancer>, EnhanceError> {
        match self {
            Backend::Onnx(options) => Ok(Arc::new(OnnxEnhancer::load(model_type, options)?)),
            Backend::Resample => Ok(Arc::new(ResampleEnhancer::new(4))),
        }
    }
}

impl Backend {
    pub fn gpu_available(&self) -> bool {
        match self {
            Backend::Onnx(_) => onnx::cuda_available(),
            Backend::Resample => false,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Backend::Onnx(_) => "onnx",
            Backend::Resample => "resample",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enhance_keeps_alpha() {
        let mut img = RgbaImage::new(3, 2);
        for pixel in img.pixels_mut() {
            *pixel = image::Rgba([10, 20, 30, 255]);
        }
        let enhancer = ResampleEnhancer::new(4);

        let out = enhancer.enhance(&DynamicImage::ImageRgba8(img)).unwrap();

        assert!(out.color().has_alpha());
        assert_eq!((out.width(), out.height()), (12, 8));
        assert_eq!(out.to_rgba8().get_pixel(5, 5)[3], 255);
    }

    #[test]
    fn test_enhance_rgb_stays_rgb() {
        let img = DynamicImage::new_rgb8(5, 7);
        let out = ResampleEnhancer::new(4).enhance(&img).unwrap();
        assert!(!out.color().has_alpha());
        assert_eq!((out.width(), out.height()), (20, 28));
    }

    #[test]
    fn test_enhance_rejects_empty_image() {
        let img = DynamicImage::new_rgb8(0, 0);
        let err = ResampleEnhancer::new(4).enhance(&img).unwrap_err();
        assert!(matches!(err, EnhanceError::PreprocessingFailed(_)));
    }

    #[test]
    fn test_enhance_downconverts_sixteen_bit() {
        let img = DynamicImage::new_rgb16(4, 4);
        let out = ResampleEnhancer::new(4).enhance(&img).unwrap();
        assert_eq!(out.color(), ColorType::Rgb8);
    }

    #[test]
    fn test_enhance_keeps_grayscale() {
        let gray = DynamicImage::ImageLuma8(GrayImage::from_pixel(3, 2, image::Luma([90])));
        let out = ResampleEnhancer::new(4).enhance(&gray).unwrap();
        assert_eq!(out.color(), ColorType::L8);
        assert_eq!((out.width(), out.height()), (12, 8));
        assert_eq!(out.to_luma8().get_pixel(4, 4)[0], 90);

        let gray_alpha = DynamicImage::ImageLumaA8(image::GrayAlphaImage::from_pixel(
            2,
            2,
            image::LumaA([200, 0]),
        ));
        let out = ResampleEnhancer::new(4).enhance(&gray_alpha).unwrap();
        assert_eq!(out.color(), ColorType::La8);
        assert_eq!(out.to_luma_alpha8().get_pixel(3, 3)[1], 0);
    }

    #[test]
    fn test_resample_backend_loads_without_models() {
        let backend = Backend::Resample;
        let enhancer = backend.load(ModelType::Anime).unwrap();
        assert_eq!(enhancer.native_scale(), 4);
        assert!(!backend.gpu_available());
    }

    #[test]
    fn test_onnx_backend_missing_model_file() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Backend::Onnx(OnnxOptions {
            models_dir: dir.path().to_path_buf(),
            tile: 256,
            tile_pad: 10,
        });
        let err = backend.load(ModelType::Photo).err().unwrap();
        assert!(matches!(err, EnhanceError::ModelNotFound(_)));
    }
}
