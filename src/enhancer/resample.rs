use super::{EnhanceError, Enhancer};
use image::{RgbImage, imageops::FilterType};

/// Interpolation-only enhancer. Stands in for a network when no model files
/// are installed; output quality is that of a plain Lanczos3 resize.
pub struct ResampleEnhancer {
    factor: u32,
}

impl ResampleEnhancer {
    pub fn new(factor: u32) -> Self {
        Self { factor }
    }
}

impl Enhancer for ResampleEnhancer {
    fn name(&self) -> &str {
        "lanczos3"
    }

    fn native_scale(&self) -> u32 {
        self.factor
    }

    fn enhance_rgb(&self, image: &RgbImage) -> Result<RgbImage, EnhanceError> {
        Ok(image::imageops::resize(
            image,
            image.width() * self.factor,
            image.height() * self.factor,
            FilterType::Lanczos3,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resample_solid_color_is_preserved() {
        let img = RgbImage::from_pixel(4, 3, image::Rgb([200, 100, 50]));
        let out = ResampleEnhancer::new(2).enhance_rgb(&img).unwrap();
        assert_eq!(out.dimensions(), (8, 6));
        assert_eq!(out.get_pixel(3, 3).0, [200, 100, 50]);
    }
}
