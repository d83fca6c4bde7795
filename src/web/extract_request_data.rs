use axum::{extract::Multipart, http::StatusCode};
use tracing::{debug, warn};

use super::{UploadLimits, error::ApiError};

/// Fields of a `POST /api/upscale` form, before domain validation.
#[derive(Debug)]
pub struct UpscaleForm {
    pub file_name: Option<String>,
    pub file_data: Vec<u8>,
    pub model_type: String,
    pub scale_rate: i64,
}

pub async fn extract_upscale_form(
    mut multipart: Multipart,
    limits: &UploadLimits,
) -> Result<UpscaleForm, ApiError> {
    let mut file: Option<(Option<String>, Vec<u8>)> = None;
    let mut model_type: Option<String> = None;
    let mut scale_rate: Option<String> = None;
    let mut ignored_fields = 0;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limits))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                if file.is_some() {
                    warn!("Multiple 'file' fields found in multipart request, using the last one");
                }

                let file_name = field.file_name().map(str::to_string);
                debug!(
                    "Received file {:?} with content type: {:?}",
                    file_name,
                    field.content_type()
                );

                let data = field
                    .bytes()
                    .await
                    .map_err(|e| multipart_error(e, limits))?
                    .to_vec();
                file = Some((file_name, data));
            }
            Some("model_type") => {
                model_type = Some(field.text().await.map_err(|e| multipart_error(e, limits))?);
            }
            Some("scale_rate") => {
                scale_rate = Some(field.text().await.map_err(|e| multipart_error(e, limits))?);
            }
            other => {
                debug!("Ignoring multipart field: {}", other.unwrap_or("unnamed"));
                ignored_fields += 1;
            }
        }
    }

    if ignored_fields > 0 {
        debug!(
            "Ignored {} unknown fields in multipart request",
            ignored_fields
        );
    }

    let (file_name, file_data) = file.ok_or_else(|| missing_field("file"))?;
    let model_type = model_type.ok_or_else(|| missing_field("model_type"))?;
    let scale_rate = scale_rate
        .ok_or_else(|| missing_field("scale_rate"))?
        .trim()
        .parse::<i64>()
        .map_err(|_| {
            ApiError::UnprocessableEntity(
                "scale_rate: Input should be a valid integer".to_string(),
            )
        })?;

    Ok(UpscaleForm {
        file_name,
        file_data,
        model_type,
        scale_rate,
    })
}

/// Checks the client file name and size; returns the lower-cased extension.
///
/// The extension is whatever follows the last `.`, or the whole name when
/// there is no dot.
pub fn validate_image(
    file_name: Option<&str>,
    size: usize,
    limits: &UploadLimits,
) -> Result<String, ApiError> {
    let ext = file_name
        .and_then(|name| name.rsplit('.').next())
        .unwrap_or("")
        .to_lowercase();

    if !limits.allowed_extensions.iter().any(|allowed| *allowed == ext) {
        return Err(ApiError::BadRequest(format!(
            "Invalid file type. Allowed: {}",
            limits.allowed_extensions.join(", ")
        )));
    }

    if size > limits.max_file_size {
        return Err(file_too_large(limits));
    }

    Ok(ext)
}

fn file_too_large(limits: &UploadLimits) -> ApiError {
    ApiError::BadRequest(format!(
        "File too large. Maximum size: {:.1}MB",
        limits.max_file_size as f64 / 1024.0 / 1024.0
    ))
}

fn missing_field(name: &str) -> ApiError {
    ApiError::UnprocessableEntity(format!("{}: Field required", name))
}

fn multipart_error(err: axum::extract::multipart::MultipartError, limits: &UploadLimits) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return file_too_large(limits);
    }
    ApiError::BadRequest(format!("Failed to process multipart request: {}", err))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> UploadLimits {
        UploadLimits {
            max_file_size: 10 * 1024 * 1024,
            allowed_extensions: vec!["jpg".into(), "jpeg".into(), "png".into(), "webp".into()],
        }
    }

    #[test]
    fn test_validate_image_accepts_case_insensitive_extension() {
        assert_eq!(validate_image(Some("Cat.JPG"), 10, &limits()).unwrap(), "jpg");
        assert_eq!(
            validate_image(Some("archive.tar.webp"), 10, &limits()).unwrap(),
            "webp"
        );
    }

    #[test]
    fn test_validate_image_rejects_extension() {
        for name in [Some("cat.gif"), Some("gif"), Some("cat."), None] {
            let err = validate_image(name, 10, &limits()).unwrap_err();
            assert_eq!(err.status(), StatusCode::BAD_REQUEST);
            assert_eq!(
                err.message(),
                "Invalid file type. Allowed: jpg, jpeg, png, webp"
            );
        }
    }

    #[test]
    fn test_validate_image_size_limit() {
        let limits = limits();
        assert!(validate_image(Some("a.png"), limits.max_file_size, &limits).is_ok());

        let err = validate_image(Some("a.png"), limits.max_file_size + 1, &limits).unwrap_err();
        assert_eq!(err.message(), "File too large. Maximum size: 10.0MB");
    }

    #[test]
    fn test_name_without_dot_is_its_own_extension() {
        assert_eq!(validate_image(Some("png"), 10, &limits()).unwrap(), "png");
    }

    #[test]
    fn test_extension_checked_before_size() {
        let err = validate_image(Some("a.gif"), usize::MAX, &limits()).unwrap_err();
        assert!(err.message().starts_with("Invalid file type."));
    }
}
