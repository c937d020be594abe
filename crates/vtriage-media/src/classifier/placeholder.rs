//! Fallback scorer used when no trained model is available.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;
use tracing::debug;

use super::preprocess::PreparedCrop;
use super::FaceClassifier;
use crate::error::{MediaError, MediaResult};

/// Upper bound on every placeholder score.
pub const PLACEHOLDER_CEILING: f32 = 0.2;

/// Score emitted by the deterministic placeholder.
pub const DEFAULT_PLACEHOLDER_SCORE: f32 = 0.05;

enum Mode {
    Fixed(f32),
    Seeded(Mutex<StdRng>),
}

/// Low, signal-free scores that keep the pipeline running without a model.
pub struct PlaceholderClassifier {
    mode: Mode,
}

impl Default for PlaceholderClassifier {
    fn default() -> Self {
        Self::fixed(DEFAULT_PLACEHOLDER_SCORE)
    }
}

impl PlaceholderClassifier {
    /// Always return `score`, clamped to `[0, PLACEHOLDER_CEILING]`.
    pub fn fixed(score: f32) -> Self {
        let score = if score.is_finite() {
            score.clamp(0.0, PLACEHOLDER_CEILING)
        } else {
            DEFAULT_PLACEHOLDER_SCORE
        };
        Self {
            mode: Mode::Fixed(score),
        }
    }

    /// Draw scores uniformly from `[0, PLACEHOLDER_CEILING)` with a seeded generator.
    pub fn seeded(seed: u64) -> Self {
        Self {
            mode: Mode::Seeded(Mutex::new(StdRng::seed_from_u64(seed))),
        }
    }
}

impl FaceClassifier for PlaceholderClassifier {
    fn name(&self) -> &'static str {
        "placeholder"
    }

    fn is_placeholder(&self) -> bool {
        true
    }

    fn predict(&self, batch: &[PreparedCrop]) -> MediaResult<Vec<f32>> {
        debug!("Placeholder scoring {} crops", batch.len());
        match &self.mode {
            Mode::Fixed(score) => Ok(vec![*score; batch.len()]),
            Mode::Seeded(rng) => {
                let mut rng = rng
                    .lock()
                    .map_err(|_| MediaError::internal("Placeholder RNG lock poisoned"))?;
                Ok(batch
                    .iter()
                    .map(|_| rng.random_range(0.0..PLACEHOLDER_CEILING))
                    .collect())
            }
        }
    }
}
