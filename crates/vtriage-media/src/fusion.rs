//! Score fusion and ranking.

use std::collections::HashMap;
use vtriage_models::{ClassifierScore, CropId, FrameRef, FusedScore, HeuristicScore, PixelRect, VideoVerdict};

/// Weight of the classifier probability.
pub const CLASSIFIER_WEIGHT: f64 = 0.6;
/// Weight of the inverted, normalised blur score.
pub const BLUR_WEIGHT: f64 = 0.25;
/// Weight of the banding score.
pub const BANDING_WEIGHT: f64 = 0.15;
/// Laplacian variance at or above which a crop counts as fully sharp.
pub const BLUR_SATURATION: f64 = 100.0;

/// Map a blur score to [0, 1], where 1 is maximally soft.
pub fn normalize_blur(blur: f64) -> f64 {
    (1.0 - (blur / BLUR_SATURATION).min(1.0)).clamp(0.0, 1.0)
}

/// Combine a classifier probability with optional heuristics.
///
/// Without heuristics the raw probability is returned unchanged.
pub fn fuse(raw_probability: f64, heuristic: Option<&HeuristicScore>) -> f64 {
    match heuristic {
        Some(h) => {
            CLASSIFIER_WEIGHT * raw_probability
                + BLUR_WEIGHT * normalize_blur(h.blur)
                + BANDING_WEIGHT * h.banding
        }
        None => raw_probability,
    }
}

/// What fusion needs to know about a crop besides its scores.
#[derive(Debug, Clone)]
pub struct CropInfo {
    pub frame: FrameRef,
    pub bbox: PixelRect,
    pub full_frame: bool,
}

/// Fuse classifier scores with the heuristics of the same crop.
///
/// Output order follows `scores`. Scores for crops without an entry in
/// `crops` are skipped.
pub fn fuse_scores(
    scores: &[ClassifierScore],
    crops: &HashMap<CropId, CropInfo>,
    heuristics: &HashMap<CropId, HeuristicScore>,
) -> Vec<FusedScore> {
    scores
        .iter()
        .filter_map(|score| {
            let info = crops.get(&score.crop)?;
            let heuristic = heuristics.get(&score.crop).copied();
            Some(FusedScore {
                crop: score.crop,
                frame: info.frame.clone(),
                bbox: info.bbox,
                full_frame: info.full_frame,
                raw_probability: score.raw_probability,
                heuristic,
                combined: fuse(score.raw_probability, heuristic.as_ref()),
            })
        })
        .collect()
}

/// Sort by combined score, highest first, ties kept in emission order, and
/// average.
pub fn rank(scores: Vec<FusedScore>) -> VideoVerdict {
    let fake_probability = if scores.is_empty() {
        0.0
    } else {
        scores.iter().map(|s| s.combined).sum::<f64>() / scores.len() as f64
    };

    let mut indexed: Vec<(usize, FusedScore)> = scores.into_iter().enumerate().collect();
    indexed.sort_by(|(ia, a), (ib, b)| b.combined.total_cmp(&a.combined).then(ia.cmp(ib)));

    VideoVerdict {
        fake_probability,
        ranked: indexed.into_iter().map(|(_, s)| s).collect(),
    }
}
