//! Loaded classifiers keyed by weights path.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;

use super::{load_classifier, ClassifierSelection, FaceClassifier};
use crate::config::ClassifierConfig;

/// Owned cache of loaded models, so repeated runs skip session creation.
///
/// Only successfully loaded models are cached; a placeholder selection is
/// recomputed on every lookup so weights that appear later are picked up.
#[derive(Default)]
pub struct ClassifierCache {
    entries: Mutex<HashMap<PathBuf, Arc<dyn FaceClassifier>>>,
}

impl ClassifierCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached model for `weights`, loading it on first use.
    pub fn get_or_load(&self, weights: Option<&Path>, config: &ClassifierConfig) -> ClassifierSelection {
        let Some(path) = weights else {
            return load_classifier(None, config);
        };

        if let Some(hit) = self.lookup(path) {
            debug!("Classifier cache hit for {}", path.display());
            return ClassifierSelection::Model(hit);
        }

        let selection = load_classifier(Some(path), config);
        if let ClassifierSelection::Model(classifier) = &selection {
            if let Ok(mut entries) = self.entries.lock() {
                entries.insert(path.to_path_buf(), Arc::clone(classifier));
            }
        }
        selection
    }

    /// Insert an already constructed classifier under `path`.
    pub fn insert(&self, path: impl Into<PathBuf>, classifier: Arc<dyn FaceClassifier>) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(path.into(), classifier);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, path: &Path) -> Option<Arc<dyn FaceClassifier>> {
        self.entries.lock().ok()?.get(path).cloned()
    }
}
