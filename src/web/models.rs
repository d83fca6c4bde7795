// API-specific data models for the web server

use crate::models::{ModelType, ScaleRate, UpscaleOutcome};
use serde::{Deserialize, Serialize};

/// Response to a successful upscale request
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UpscaleResponse {
    pub success: bool,
    pub filename: String,
    pub original_size: (u32, u32),
    pub upscaled_size: (u32, u32),
    pub processing_time: f64,
    #[serde(default)]
    pub message: String,
}

impl UpscaleResponse {
    pub fn new(
        filename: String,
        outcome: &UpscaleOutcome,
        model_type: ModelType,
        scale: ScaleRate,
    ) -> Self {
        Self {
            success: true,
            filename,
            original_size: outcome.original_size,
            upscaled_size: outcome.upscaled_size,
            processing_time: outcome.processing_time,
            message: format!("Successfully upscaled {}x using {} model", scale, model_type),
        }
    }
}

/// Health check response
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub gpu_available: bool,
    /// Cache keys of the models already in memory, e.g. `photo_4`.
    pub loaded_models: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_upscale_response_wire_format() {
        let outcome = UpscaleOutcome {
            original_size: (10, 20),
            upscaled_size: (20, 40),
            processing_time: 1.5,
        };
        let response =
            UpscaleResponse::new("id_output.png".into(), &outcome, ModelType::Anime, ScaleRate::X2);

        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "success": true,
                "filename": "id_output.png",
                "original_size": [10, 20],
                "upscaled_size": [20, 40],
                "processing_time": 1.5,
                "message": "Successfully upscaled 2x using anime model",
            })
        );
    }
}
