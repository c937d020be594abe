//! JSON report returned to callers.
//!
//! The report has exactly two shapes:
//! - `{"error": "no_frames", "notes": ...}` when nothing could be sampled
//! - `{"fake_probability": ..., "ranked_frames": [...], "notes": ..., "stats": {...}}`
//!
//! The no-data shape deliberately has no `fake_probability`, so a run that
//! produced nothing cannot be mistaken for a run that scored 0.0.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::rect::PixelRect;
use crate::score::{FusedScore, VideoVerdict};

/// Error code of the no-data report.
pub const NO_FRAMES_ERROR: &str = "no_frames";

/// One entry of the ranked frame list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RankedFrame {
    pub frame_index: u32,
    pub frame_path: PathBuf,
    pub timestamp_secs: f64,
    pub crop_index: u32,
    pub bbox: PixelRect,
    pub full_frame: bool,
    pub score: f64,
}

impl From<&FusedScore> for RankedFrame {
    fn from(fused: &FusedScore) -> Self {
        Self {
            frame_index: fused.frame.index.0,
            frame_path: fused.frame.path.clone(),
            timestamp_secs: fused.frame.timestamp_secs,
            crop_index: fused.crop.crop,
            bbox: fused.bbox,
            full_frame: fused.full_frame,
            score: fused.combined,
        }
    }
}

/// Counters describing what happened during a scored run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RunStats {
    /// Frames emitted by the sampler
    pub frames_sampled: u32,
    /// Sampled frames whose image could not be decoded
    pub frames_unreadable: u32,
    /// Crops handed downstream, including full-frame fallbacks
    pub crops_located: u32,
    /// Frames where no face was found
    pub full_frame_fallbacks: u32,
    /// Crops that received a classifier score
    pub crops_classified: u32,
    /// Crops dropped because preprocessing failed
    pub crops_dropped: u32,
    /// Name of the classifier that produced the scores
    pub classifier: String,
    /// True when scores come from the no-model placeholder
    pub placeholder_scores: bool,
}

/// Result of one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum AnalysisReport {
    /// The source yielded no frames.
    NoData { error: String, notes: String },
    /// Normal completion.
    Scored {
        fake_probability: f64,
        ranked_frames: Vec<RankedFrame>,
        notes: String,
        stats: RunStats,
    },
}

impl AnalysisReport {
    /// Build the no-data report.
    pub fn no_data(notes: impl Into<String>) -> Self {
        Self::NoData {
            error: NO_FRAMES_ERROR.to_string(),
            notes: notes.into(),
        }
    }

    /// Build a scored report from a verdict.
    pub fn scored(verdict: &VideoVerdict, notes: impl Into<String>, stats: RunStats) -> Self {
        Self::Scored {
            fake_probability: verdict.fake_probability,
            ranked_frames: verdict.ranked.iter().map(RankedFrame::from).collect(),
            notes: notes.into(),
            stats,
        }
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, Self::NoData { .. })
    }

    /// Aggregate fake probability; `None` for the no-data report.
    pub fn fake_probability(&self) -> Option<f64> {
        match self {
            Self::NoData { .. } => None,
            Self::Scored {
                fake_probability, ..
            } => Some(*fake_probability),
        }
    }

    pub fn notes(&self) -> &str {
        match self {
            Self::NoData { notes, .. } | Self::Scored { notes, .. } => notes,
        }
    }

    pub fn ranked_frames(&self) -> &[RankedFrame] {
        match self {
            Self::NoData { .. } => &[],
            Self::Scored { ranked_frames, .. } => ranked_frames,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{CropId, FrameIndex, FrameRef};

    fn fused(index: u32, combined: f64) -> FusedScore {
        FusedScore {
            crop: CropId::new(FrameIndex(index), 0),
            frame: FrameRef::new(index, 10, 25.0, format!("/tmp/frame_{index:06}.jpg")),
            bbox: PixelRect::new(4, 4, 40, 40),
            full_frame: false,
            raw_probability: combined,
            heuristic: None,
            combined,
        }
    }

    #[test]
    fn test_no_data_shape_has_no_probability() {
        let report = AnalysisReport::no_data("Could not open video or extract frames.");
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["error"], "no_frames");
        assert!(json.get("fake_probability").is_none());
        assert!(report.fake_probability().is_none());
        assert!(report.is_no_data());
    }

    #[test]
    fn test_scored_shape() {
        let verdict = VideoVerdict {
            fake_probability: 0.5,
            ranked: vec![fused(1, 0.7), fused(0, 0.3)],
        };
        let report = AnalysisReport::scored(&verdict, "heuristic output", RunStats::default());
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["fake_probability"], 0.5);
        assert!(json.get("error").is_none());
        assert_eq!(json["ranked_frames"][0]["frame_index"], 1);
        assert_eq!(json["ranked_frames"][0]["frame_path"], "/tmp/frame_000001.jpg");
        assert_eq!(json["ranked_frames"][1]["score"], 0.3);
    }

    #[test]
    fn test_untagged_round_trip_picks_right_variant() {
        let no_data: AnalysisReport =
            serde_json::from_str(r#"{"error":"no_frames","notes":"n"}"#).unwrap();
        assert!(no_data.is_no_data());

        let verdict = VideoVerdict {
            fake_probability: 0.25,
            ranked: vec![fused(0, 0.25)],
        };
        let json = serde_json::to_string(&AnalysisReport::scored(
            &verdict,
            "n",
            RunStats::default(),
        ))
        .unwrap();
        let scored: AnalysisReport = serde_json::from_str(&json).unwrap();
        assert_eq!(scored.fake_probability(), Some(0.25));
        assert_eq!(scored.ranked_frames().len(), 1);
    }

    #[test]
    fn test_schema_generation() {
        let schema = schemars::schema_for!(AnalysisReport);
        let json = serde_json::to_string(&schema).unwrap();
        assert!(json.contains("ranked_frames"));
        assert!(json.contains("error"));
    }
}
