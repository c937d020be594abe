#![deny(unreachable_patterns)]
//! Heuristic video tampering triage.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with cancellation and timeouts
//! - Frame sampling at a target rate via FFmpeg/FFprobe
//! - Face location (OpenCV Haar cascade or SeetaFace) with full-frame fallback
//! - Blur and banding heuristics on OpenCV `imgproc` (`imageproc` without OpenCV)
//! - A pluggable manipulation classifier (ONNX Runtime or placeholder)
//! - Score fusion, ranking and the JSON report

pub mod cancel;
pub mod classifier;
pub mod command;
pub mod config;
#[cfg(feature = "opencv")]
mod cv;
pub mod error;
pub mod face;
pub mod fusion;
pub mod heuristics;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod probe;
pub mod progress;
pub mod sampler;
pub mod storage;

pub use cancel::CancelSignal;
pub use classifier::{
    load_classifier, ClassifierCache, ClassifierSelection, FaceClassifier, OnnxClassifier,
    PlaceholderClassifier, PreparedCrop, PLACEHOLDER_CEILING,
};
pub use command::{FfmpegCommand, FfmpegRunner};
pub use config::{ClassifierConfig, FaceLocatorConfig, TriageConfig};
pub use error::{MediaError, MediaResult};
pub use face::{build_locator, locate_faces, FaceCrop, FaceLocator, FrameCrops, NoFaceLocator, SeetaLocator};
pub use fusion::{fuse, normalize_blur, rank};
pub use heuristics::{banding_score, blur_score, score_crop};
pub use logging::RunLogger;
pub use pipeline::{AnalysisRun, TriagePipeline, TriagePipelineBuilder};
pub use probe::{probe_video, VideoInfo};
pub use progress::FfmpegProgress;
pub use sampler::{sampling_step, FrameSampler, SampleOutcome, SampledFrame};
pub use storage::FrameScope;

#[cfg(feature = "opencv")]
pub use face::HaarCascadeLocator;
