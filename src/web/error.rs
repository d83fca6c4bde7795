// Error types for the API server

use crate::enhancer::EnhanceError;
use crate::upscaler::UpscaleError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// API server error types
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    UnprocessableEntity(String),
    InternalServerError(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::UnprocessableEntity(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest(msg)
            | Self::NotFound(msg)
            | Self::UnprocessableEntity(msg)
            | Self::InternalServerError(msg) => msg,
        }
    }

    /// Anything that went wrong while producing the result.
    pub fn upscaling_failed(cause: impl std::fmt::Display) -> Self {
        Self::InternalServerError(format!("Upscaling failed: {}", cause))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Clients read `detail`
        let body = Json(json!({ "detail": self.message() }));
        (status, body).into_response()
    }
}

impl From<UpscaleError> for ApiError {
    fn from(error: UpscaleError) -> Self {
        match error {
            UpscaleError::UnreadableImage { .. } => Self::BadRequest(error.to_string()),
            other => Self::upscaling_failed(other),
        }
    }
}

impl From<EnhanceError> for ApiError {
    fn from(error: EnhanceError) -> Self {
        Self::upscaling_failed(error)
    }
}

impl From<std::io::Error> for ApiError {
    fn from(error: std::io::Error) -> Self {
        Self::upscaling_failed(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn test_error_body_has_detail() {
        let response = ApiError::NotFound("File not found".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, json!({ "detail": "File not found" }));
    }

    #[test]
    fn test_unreadable_image_is_client_error() {
        let err: ApiError = UpscaleError::UnreadableImage {
            path: "uploads/x_input.png".to_string(),
            reason: "bad header".to_string(),
        }
        .into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.message().starts_with("Failed to read image: uploads/x_input.png"));
    }

    #[test]
    fn test_inference_failure_is_server_error() {
        let err: ApiError = UpscaleError::Enhance(EnhanceError::InferenceFailed(
            "out of memory".to_string(),
        ))
        .into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            err.message(),
            "Upscaling failed: Inference failed: out of memory"
        );
    }
}
