//! Sampled frame and face crop identifiers.
//!
//! Every stage of the pipeline carries these identifiers instead of matching
//! results back together by storage path.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Dense, zero-based position of a frame in the sampled sequence.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(transparent)]
pub struct FrameIndex(pub u32);

impl FrameIndex {
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for FrameIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to one extracted frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FrameRef {
    /// Position in the sampled sequence
    pub index: FrameIndex,
    /// Position in the decoded source stream (before subsampling)
    pub source_index: u64,
    /// Where the frame image was persisted
    pub path: PathBuf,
    /// Presentation time in the source, in seconds
    pub timestamp_secs: f64,
}

impl FrameRef {
    /// Create a frame reference, deriving the timestamp from the source index.
    pub fn new(index: u32, step: u32, native_fps: f64, path: impl Into<PathBuf>) -> Self {
        let source_index = index as u64 * step as u64;
        let timestamp_secs = if native_fps > 0.0 {
            source_index as f64 / native_fps
        } else {
            0.0
        };

        Self {
            index: FrameIndex(index),
            source_index,
            path: path.into(),
            timestamp_secs,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Identifies a single crop within a run: the frame it came from and its
/// position among that frame's crops.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
pub struct CropId {
    pub frame: FrameIndex,
    pub crop: u32,
}

impl CropId {
    pub fn new(frame: FrameIndex, crop: u32) -> Self {
        Self { frame, crop }
    }
}

impl fmt::Display for CropId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.frame, self.crop)
    }
}
