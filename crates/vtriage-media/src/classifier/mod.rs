//! Manipulation classifier adapter.
//!
//! The pipeline only sees [`FaceClassifier`]. Which implementation backs it
//! is decided once, at construction, by [`load_classifier`]: an ONNX model
//! when weights are available, otherwise a placeholder whose scores carry no
//! signal. Missing weights are a normal outcome, not an error.

mod cache;
mod onnx;
mod placeholder;
mod preprocess;

pub use cache::ClassifierCache;
pub use onnx::{sigmoid, OnnxClassifier};
pub use placeholder::{PlaceholderClassifier, DEFAULT_PLACEHOLDER_SCORE, PLACEHOLDER_CEILING};
pub use preprocess::{preprocess, PreparedCrop, INPUT_SIZE, MEAN, STD, TENSOR_LEN};

use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::ClassifierConfig;
use crate::error::MediaResult;

/// Scores prepared crops for manipulation likelihood.
pub trait FaceClassifier: Send + Sync {
    /// Short identifier used in logs and run stats.
    fn name(&self) -> &'static str;

    /// True when scores do not come from a trained model.
    fn is_placeholder(&self) -> bool;

    /// One probability in [0, 1] per input, in input order.
    fn predict(&self, batch: &[PreparedCrop]) -> MediaResult<Vec<f32>>;
}

/// The classifier a pipeline will use and why.
#[derive(Clone)]
pub enum ClassifierSelection {
    Model(Arc<dyn FaceClassifier>),
    Placeholder {
        classifier: Arc<dyn FaceClassifier>,
        reason: String,
    },
}

impl ClassifierSelection {
    /// Placeholder chosen for `reason`, configured from `config`.
    pub fn placeholder(config: &ClassifierConfig, reason: impl Into<String>) -> Self {
        Self::Placeholder {
            classifier: Arc::new(placeholder_for(config)),
            reason: reason.into(),
        }
    }

    pub fn classifier(&self) -> &Arc<dyn FaceClassifier> {
        match self {
            Self::Model(classifier) => classifier,
            Self::Placeholder { classifier, .. } => classifier,
        }
    }

    /// Why the placeholder was chosen, `None` for a real model.
    pub fn placeholder_reason(&self) -> Option<&str> {
        match self {
            Self::Model(_) => None,
            Self::Placeholder { reason, .. } => Some(reason),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Self::Placeholder { .. })
    }
}

impl std::fmt::Debug for ClassifierSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Model(c) => f.debug_tuple("Model").field(&c.name()).finish(),
            Self::Placeholder { reason, .. } => f
                .debug_struct("Placeholder")
                .field("reason", reason)
                .finish(),
        }
    }
}

/// Placeholder configured from `config`: seeded when a seed is set,
/// otherwise the fixed score.
pub fn placeholder_for(config: &ClassifierConfig) -> PlaceholderClassifier {
    match config.placeholder_seed {
        Some(seed) => PlaceholderClassifier::seeded(seed),
        None => PlaceholderClassifier::fixed(config.placeholder_score),
    }
}

/// Load the ONNX classifier at `weights`, or fall back to the placeholder.
pub fn load_classifier(weights: Option<&Path>, config: &ClassifierConfig) -> ClassifierSelection {
    let Some(path) = weights else {
        info!("No classifier weights configured, using placeholder scores");
        return ClassifierSelection::placeholder(config, "no classifier weights configured");
    };

    if !path.exists() {
        warn!(
            "Classifier weights not found at {}, using placeholder scores",
            path.display()
        );
        return ClassifierSelection::placeholder(
            config,
            format!("classifier weights not found at {}", path.display()),
        );
    }

    match OnnxClassifier::from_file(path, config.output_name.clone(), config.batch_size) {
        Ok(classifier) => ClassifierSelection::Model(Arc::new(classifier)),
        Err(e) => {
            warn!("Failed to load classifier {}: {}", path.display(), e);
            ClassifierSelection::placeholder(
                config,
                format!("classifier at {} could not be loaded: {}", path.display(), e),
            )
        }
    }
}
