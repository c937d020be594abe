//! Triage configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::classifier::DEFAULT_PLACEHOLDER_SCORE;

/// Default sampling rate in frames per second.
pub const DEFAULT_TARGET_FPS: f64 = 0.5;

/// Face locator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceLocatorConfig {
    /// OpenCV Haar cascade XML (used with the `opencv` feature)
    pub cascade_path: Option<PathBuf>,
    /// SeetaFace frontal detector model
    pub seeta_model_path: Option<PathBuf>,
    /// Smallest face side in pixels
    pub min_face_size: u32,
}

impl Default for FaceLocatorConfig {
    fn default() -> Self {
        Self {
            cascade_path: Some(PathBuf::from(
                "/usr/share/opencv4/haarcascades/haarcascade_frontalface_default.xml",
            )),
            seeta_model_path: Some(PathBuf::from("./models/seeta_fd_frontal_v1.0.bin")),
            min_face_size: 40,
        }
    }
}

impl FaceLocatorConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            cascade_path: std::env::var("TRIAGE_CASCADE_PATH")
                .ok()
                .map(PathBuf::from)
                .or(defaults.cascade_path),
            seeta_model_path: std::env::var("TRIAGE_FACE_MODEL")
                .ok()
                .map(PathBuf::from)
                .or(defaults.seeta_model_path),
            min_face_size: std::env::var("TRIAGE_MIN_FACE_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.min_face_size),
        }
    }
}

/// Classifier configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// ONNX weights; the placeholder is used when absent or missing on disk
    pub weights_path: Option<PathBuf>,
    /// Name of the logits output tensor
    pub output_name: String,
    /// Crops per inference call
    pub batch_size: usize,
    /// Score emitted by the fixed placeholder
    pub placeholder_score: f32,
    /// Seed that switches the placeholder to uniform draws
    pub placeholder_seed: Option<u64>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            weights_path: Some(PathBuf::from("./weights/video_deepfake_model.onnx")),
            output_name: "output".to_string(),
            batch_size: 32,
            placeholder_score: DEFAULT_PLACEHOLDER_SCORE,
            placeholder_seed: None,
        }
    }
}

impl ClassifierConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            weights_path: std::env::var("VIDEO_MODEL_WEIGHTS_PATH")
                .ok()
                .map(PathBuf::from)
                .or(defaults.weights_path),
            output_name: std::env::var("TRIAGE_MODEL_OUTPUT").unwrap_or(defaults.output_name),
            batch_size: std::env::var("TRIAGE_BATCH_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.batch_size),
            placeholder_score: std::env::var("TRIAGE_PLACEHOLDER_SCORE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.placeholder_score),
            placeholder_seed: std::env::var("TRIAGE_PLACEHOLDER_SEED")
                .ok()
                .and_then(|s| s.parse().ok()),
        }
    }
}

/// Configuration for one triage pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageConfig {
    /// Sampling rate in frames per second
    pub target_fps: f64,
    /// Keep frames in this directory instead of a temporary one
    pub frames_dir: Option<PathBuf>,
    /// Parent directory for temporary frame directories
    pub work_dir: Option<PathBuf>,
    /// Wall-clock limit for a whole run
    pub run_timeout: Option<Duration>,
    /// JPEG quality for extracted frames (2 = best, 31 = worst)
    pub jpeg_quality: u8,
    pub face: FaceLocatorConfig,
    pub classifier: ClassifierConfig,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            target_fps: DEFAULT_TARGET_FPS,
            frames_dir: None,
            work_dir: None,
            run_timeout: Some(Duration::from_secs(600)), // 10 minutes
            jpeg_quality: 2,
            face: FaceLocatorConfig::default(),
            classifier: ClassifierConfig::default(),
        }
    }
}

impl TriageConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            target_fps: std::env::var("TRIAGE_TARGET_FPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_TARGET_FPS),
            frames_dir: std::env::var("TRIAGE_FRAMES_DIR").ok().map(PathBuf::from),
            work_dir: std::env::var("TRIAGE_WORK_DIR").ok().map(PathBuf::from),
            // 0 disables the limit.
            run_timeout: Some(
                std::env::var("TRIAGE_RUN_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(600),
            )
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs),
            jpeg_quality: std::env::var("TRIAGE_JPEG_QUALITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            face: FaceLocatorConfig::from_env(),
            classifier: ClassifierConfig::from_env(),
        }
    }
}
