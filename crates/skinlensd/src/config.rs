use std::net::SocketAddr;
use std::path::PathBuf;

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// Listen address (default: 0.0.0.0:5000).
    pub bind: SocketAddr,
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// Optional TOML style catalog replacing the built-in one.
    pub styles_path: Option<PathBuf>,
    /// Style active at startup.
    pub default_style: String,
    /// TrueType font replacing the built-in "Face Verified" overlay font.
    pub font_path: Option<PathBuf>,
    /// Requests that may wait for the engine thread before senders block.
    pub queue_depth: usize,
    /// Minimum face-presence probability for a detection to count.
    pub presence_threshold: f32,
    /// Size every `/process_frame` upload is resized to.
    pub preview_width: u32,
    pub preview_height: u32,
    /// JPEG quality of `/process_frame` responses.
    pub preview_quality: u8,
    /// Upper bound on a multipart request body.
    pub max_upload_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 5000)),
            model_dir: skinlens_core::default_model_dir(),
            styles_path: None,
            default_style: "natural".to_string(),
            font_path: None,
            queue_depth: 4,
            presence_threshold: skinlens_core::detector::DEFAULT_PRESENCE_THRESHOLD,
            preview_width: 480,
            preview_height: 360,
            preview_quality: 70,
            max_upload_bytes: 8 * 1024 * 1024,
        }
    }
}

impl Config {
    /// Load configuration from `SKINLENS_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let bind = match std::env::var("SKINLENS_BIND") {
            Ok(v) => v.parse().unwrap_or_else(|e| {
                tracing::warn!(value = %v, error = %e, "invalid SKINLENS_BIND; using default");
                defaults.bind
            }),
            Err(_) => defaults.bind,
        };

        Self {
            bind,
            model_dir: std::env::var("SKINLENS_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_dir),
            styles_path: std::env::var("SKINLENS_STYLES_PATH").ok().map(PathBuf::from),
            default_style: std::env::var("SKINLENS_DEFAULT_STYLE").unwrap_or(defaults.default_style),
            font_path: std::env::var("SKINLENS_FONT_PATH").ok().map(PathBuf::from),
            queue_depth: env_usize("SKINLENS_QUEUE_DEPTH", defaults.queue_depth).max(1),
            presence_threshold: env_f32("SKINLENS_PRESENCE_THRESHOLD", defaults.presence_threshold),
            preview_width: env_u32("SKINLENS_PREVIEW_WIDTH", defaults.preview_width).max(1),
            preview_height: env_u32("SKINLENS_PREVIEW_HEIGHT", defaults.preview_height).max(1),
            preview_quality: env_u32("SKINLENS_PREVIEW_QUALITY", defaults.preview_quality as u32).clamp(1, 100) as u8,
            max_upload_bytes: env_usize("SKINLENS_MAX_UPLOAD_BYTES", defaults.max_upload_bytes),
        }
    }

    /// Path to the SCRFD face detection model.
    pub fn face_detector_model_path(&self) -> String {
        self.model_dir
            .join("det_10g.onnx")
            .to_string_lossy()
            .into_owned()
    }

    /// Path to the face-mesh landmark model.
    pub fn face_mesh_model_path(&self) -> String {
        self.model_dir
            .join("face_mesh.onnx")
            .to_string_lossy()
            .into_owned()
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = Config::default();
        assert_eq!(c.bind.port(), 5000);
        assert_eq!(c.default_style, "natural");
        assert_eq!((c.preview_width, c.preview_height, c.preview_quality), (480, 360, 70));
        assert!(c.face_mesh_model_path().ends_with("face_mesh.onnx"));
        assert!(c.face_detector_model_path().ends_with("det_10g.onnx"));
    }

    #[test]
    fn test_env_helpers_fall_back_on_garbage() {
        std::env::set_var("SKINLENS_TEST_ENV_GARBAGE", "not-a-number");
        assert_eq!(env_usize("SKINLENS_TEST_ENV_GARBAGE", 7), 7);
        assert_eq!(env_f32("SKINLENS_TEST_ENV_GARBAGE", 0.25), 0.25);
        std::env::set_var("SKINLENS_TEST_ENV_U32", "640");
        assert_eq!(env_u32("SKINLENS_TEST_ENV_U32", 1), 640);
        assert_eq!(env_u32("SKINLENS_TEST_ENV_UNSET", 3), 3);
    }
}
