// Domain types shared by the upscaler, the model cache and the web layer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Model family requested by the client.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    Photo,
    Anime,
}

impl ModelType {
    /// Name of the pretrained network backing this family.
    /// The ONNX export is expected at `<models_dir>/<name>.onnx`.
    pub fn model_name(self) -> &'static str {
        match self {
            ModelType::Photo => "RealESRGAN_x4plus",
            ModelType::Anime => "RealESRGAN_x4plus_anime_6B",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ModelType::Photo => "photo",
            ModelType::Anime => "anime",
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidModelType;

impl fmt::Display for InvalidModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("model_type must be 'photo' or 'anime'")
    }
}

impl std::error::Error for InvalidModelType {}

impl FromStr for ModelType {
    type Err = InvalidModelType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "photo" => Ok(ModelType::Photo),
            "anime" => Ok(ModelType::Anime),
            _ => Err(InvalidModelType),
        }
    }
}

/// Enlargement factor requested by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScaleRate {
    X2,
    X4,
}

impl ScaleRate {
    pub fn factor(self) -> u32 {
        match self {
            ScaleRate::X2 => 2,
            ScaleRate::X4 => 4,
        }
    }
}

impl fmt::Display for ScaleRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.factor())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidScaleRate;

impl fmt::Display for InvalidScaleRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("scale_rate must be 2 or 4")
    }
}

impl std::error::Error for InvalidScaleRate {}

impl TryFrom<i64> for ScaleRate {
    type Error = InvalidScaleRate;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            2 => Ok(ScaleRate::X2),
            4 => Ok(ScaleRate::X4),
            _ => Err(InvalidScaleRate),
        }
    }
}

/// Cache key for loaded upscalers: one instance per (family, scale) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModelKey {
    pub model_type: ModelType,
    pub scale: ScaleRate,
}

impl ModelKey {
    pub fn new(model_type: ModelType, scale: ScaleRate) -> Self {
        Self { model_type, scale }
    }
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.model_type, self.scale)
    }
}

/// Parses the `family:scale` form used by `--preload`.
impl FromStr for ModelKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (family, scale) = s
            .split_once(':')
            .ok_or_else(|| format!("expected 'family:scale', got '{}'", s))?;
        let model_type = family.trim().parse::<ModelType>().map_err(|e| e.to_string())?;
        let scale = scale
            .trim()
            .parse::<i64>()
            .map_err(|_| InvalidScaleRate.to_string())
            .and_then(|n| ScaleRate::try_from(n).map_err(|e| e.to_string()))?;
        Ok(Self::new(model_type, scale))
    }
}

/// Result of a single upscale run.
#[derive(Debug, Clone, PartialEq)]
pub struct UpscaleOutcome {
    pub original_size: (u32, u32),
    pub upscaled_size: (u32, u32),
    /// Wall-clock seconds spent reading, enhancing and writing the image.
    pub processing_time: f64,
}
