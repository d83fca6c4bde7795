use crate::enhancer::{Backend, OnnxOptions};
use crate::models::ModelKey;
use crate::web::UploadLimits;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing::Level;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Real-ESRGAN networks through ONNX Runtime
    Onnx,
    /// Lanczos3 only, no model files needed
    Resample,
}

/// Command line arguments for upscaler-server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct AppConfig {
    /// Hostname/IP to bind the server to.
    /// If this option is specified without value, it will default to "*", meaning the server will listen on all interfaces.
    #[arg(long, env = "UPSCALER_HOST", default_value = "localhost", num_args = 0..=1, default_missing_value = "*")]
    pub host: String,

    /// Port number to listen on.
    #[arg(short, long, env = "PORT", default_value_t = 8000)]
    pub port: u16,

    /// Directory for uploaded inputs and upscaled results.
    /// Results are never deleted by the server.
    #[arg(long, env = "UPLOAD_DIR", default_value = "./uploads")]
    pub upload_dir: PathBuf,

    /// Maximum accepted file size in bytes.
    #[arg(long, env = "MAX_FILE_SIZE", default_value_t = 10 * 1024 * 1024)]
    pub max_file_size: usize,

    /// Comma-separated list of accepted file extensions.
    #[arg(long, env = "ALLOWED_EXTENSIONS", value_delimiter = ',', default_value = "jpg,jpeg,png,webp")]
    pub allowed_extensions: Vec<String>,

    /// Inference backend.
    #[arg(long, env = "UPSCALER_BACKEND", value_enum, default_value_t = BackendKind::Onnx)]
    pub backend: BackendKind,

    /// Directory containing RealESRGAN_x4plus.onnx and RealESRGAN_x4plus_anime_6B.onnx.
    #[arg(long, env = "UPSCALER_MODELS_DIR", default_value = "./models")]
    pub models_dir: PathBuf,

    /// Tile size for inference (smaller = less memory, slower). 0 disables tiling.
    #[arg(long, env = "UPSCALER_TILE", default_value_t = 256)]
    pub tile: u32,

    /// Overlap added around each tile.
    #[arg(long, env = "UPSCALER_TILE_PAD", default_value_t = 10)]
    pub tile_pad: u32,

    /// Comma-separated list of allowed CORS origins. A '*' inside an entry is a wildcard.
    #[arg(
        long,
        env = "CORS_ORIGINS",
        value_delimiter = ',',
        default_value = "http://localhost:5173,http://localhost:3000,https://pixelaistudio.vercel.app,https://*.vercel.app"
    )]
    pub cors_origins: Vec<String>,

    /// Models to load at startup, as a comma-separated list of family:scale (e.g. photo:4,anime:2).
    #[arg(long, env = "UPSCALER_PRELOAD", value_delimiter = ',')]
    pub preload: Vec<ModelKey>,

    /// Maximum log level.
    #[arg(long, env = "UPSCALER_LOG_LEVEL", default_value_t = Level::INFO)]
    pub log_level: Level,
}

impl AppConfig {
    pub fn backend(&self) -> Backend {
        match self.backend {
            BackendKind::Onnx => Backend::Onnx(OnnxOptions {
                models_dir: self.models_dir.clone(),
                tile: self.tile,
                tile_pad: self.tile_pad,
            }),
            BackendKind::Resample => Backend::Resample,
        }
    }

    pub fn upload_limits(&self) -> UploadLimits {
        UploadLimits {
            max_file_size: self.max_file_size,
            allowed_extensions: self
                .allowed_extensions
                .iter()
                .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
                .filter(|ext| !ext.is_empty())
                .collect(),
        }
    }

    pub fn cors_origins(&self) -> Vec<String> {
        self.cors_origins
            .iter()
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ModelType, ScaleRate};
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        AppConfig::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::try_parse_from(["upscaler-server"]).unwrap();

        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 8000);
        assert_eq!(config.backend, BackendKind::Onnx);
        assert_eq!(config.upload_limits().max_file_size, 10 * 1024 * 1024);
        assert_eq!(
            config.cors_origins(),
            vec![
                "http://localhost:5173",
                "http://localhost:3000",
                "https://pixelaistudio.vercel.app",
                "https://*.vercel.app",
            ]
        );
        assert!(config.preload.is_empty());
    }

    #[test]
    fn test_parse_explicit_values() {
        let config = AppConfig::try_parse_from([
            "upscaler-server",
            "--host",
            "--port",
            "9000",
            "--allowed-extensions",
            " PNG, .jpg ,",
            "--backend",
            "resample",
            "--preload",
            "photo:4,anime:2",
            "--cors-origins",
            "https://*.vercel.app",
            "--log-level",
            "debug",
        ])
        .unwrap();

        assert_eq!(config.host, "*");
        assert_eq!(config.port, 9000);
        assert_eq!(config.backend, BackendKind::Resample);
        assert!(matches!(config.backend(), Backend::Resample));
        assert_eq!(config.upload_limits().allowed_extensions, vec!["png", "jpg"]);
        assert_eq!(
            config.preload,
            vec![
                ModelKey::new(ModelType::Photo, ScaleRate::X4),
                ModelKey::new(ModelType::Anime, ScaleRate::X2),
            ]
        );
        assert_eq!(config.cors_origins(), vec!["https://*.vercel.app"]);
        assert_eq!(config.log_level, Level::DEBUG);
    }

    #[test]
    fn test_onnx_backend_options() {
        let config = AppConfig::try_parse_from([
            "upscaler-server",
            "--backend",
            "onnx",
            "--models-dir",
            "/opt/models",
            "--tile",
            "0",
            "--tile-pad",
            "4",
        ])
        .unwrap();

        match config.backend() {
            Backend::Onnx(options) => {
                assert_eq!(options.models_dir, PathBuf::from("/opt/models"));
                assert_eq!(options.tile, 0);
                assert_eq!(options.tile_pad, 4);
            }
            Backend::Resample => panic!("expected the onnx backend"),
        }
    }

    #[test]
    fn test_rejects_bad_preload() {
        let result = AppConfig::try_parse_from(["upscaler-server", "--preload", "photo:3"]);
        assert!(result.is_err());
    }
}
