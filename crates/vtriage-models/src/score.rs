//! Per-crop scores and the aggregated video verdict.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::frame::{CropId, FrameRef};
use crate::rect::PixelRect;

/// Model-free image statistics for one crop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct HeuristicScore {
    /// Laplacian variance; higher means sharper, never negative
    pub blur: f64,
    /// `1 - mean edge strength`, in [0, 1]; higher means smoother
    pub banding: f64,
}

/// Output of the classifier for one preprocessed crop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ClassifierScore {
    pub crop: CropId,
    /// Manipulation likelihood in [0, 1]
    pub raw_probability: f64,
}

/// Classifier output fused with heuristics, tied back to its frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FusedScore {
    pub crop: CropId,
    pub frame: FrameRef,
    pub bbox: PixelRect,
    /// True when the crop is the whole frame because no face was found
    pub full_frame: bool,
    pub raw_probability: f64,
    /// Heuristics used for fusion, if any were available
    pub heuristic: Option<HeuristicScore>,
    /// Fused suspicion score; typically in [0, 1] but not clamped
    pub combined: f64,
}

/// Aggregate over all fused scores of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VideoVerdict {
    /// Mean of all combined scores, 0.0 when there are none
    pub fake_probability: f64,
    /// Fused scores sorted by combined score, highest first
    pub ranked: Vec<FusedScore>,
}

impl VideoVerdict {
    pub fn is_empty(&self) -> bool {
        self.ranked.is_empty()
    }

    /// Highest-scoring crop, if any.
    pub fn top(&self) -> Option<&FusedScore> {
        self.ranked.first()
    }
}
