//! Shared data models for the vtriage pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Run identifiers
//! - Sampled frame and face crop references
//! - Pixel-space bounding boxes
//! - Heuristic, classifier and fused scores
//! - The video verdict and the JSON report shape

pub mod frame;
pub mod rect;
pub mod report;
pub mod run;
pub mod score;

// Re-export common types
pub use frame::{CropId, FrameIndex, FrameRef};
pub use rect::PixelRect;
pub use report::{AnalysisReport, RankedFrame, RunStats, NO_FRAMES_ERROR};
pub use run::RunId;
pub use score::{ClassifierScore, FusedScore, HeuristicScore, VideoVerdict};
