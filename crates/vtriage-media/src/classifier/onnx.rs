//! ONNX Runtime manipulation classifier.
//!
//! Expects a model taking `[N, 3, 224, 224]` f32 input (ImageNet-normalised
//! CHW) and producing one logit per item, shaped `[N, 1]` or `[N]`. Logits
//! are mapped to probabilities with a sigmoid.

use std::path::Path;
use std::sync::Mutex;

use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{Tensor, Value};
use tracing::{debug, info};

use super::preprocess::{PreparedCrop, INPUT_SIZE, TENSOR_LEN};
use super::FaceClassifier;
use crate::error::{MediaError, MediaResult};

/// Binary real/fake classifier loaded from an `.onnx` weights file.
pub struct OnnxClassifier {
    session: Mutex<Session>,
    output_name: String,
    batch_size: usize,
}

impl OnnxClassifier {
    /// Load the model at `weights_path`.
    pub fn from_file(
        weights_path: &Path,
        output_name: impl Into<String>,
        batch_size: usize,
    ) -> MediaResult<Self> {
        if !weights_path.exists() {
            return Err(MediaError::model_not_found(weights_path.display().to_string()));
        }

        let session = create_session(weights_path)?;
        let output_name = output_name.into();

        info!(
            weights = %weights_path.display(),
            output = %output_name,
            "Manipulation classifier loaded"
        );

        Ok(Self {
            session: Mutex::new(session),
            output_name,
            batch_size: batch_size.max(1),
        })
    }

    fn run_chunk(&self, chunk: &[PreparedCrop]) -> MediaResult<Vec<f32>> {
        let n = chunk.len();
        let input = input_tensor(chunk)?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| MediaError::internal("Session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| MediaError::inference_failed(format!("ONNX inference failed: {}", e)))?;

        let output = outputs.get(self.output_name.as_str()).ok_or_else(|| {
            MediaError::inference_failed(format!("Missing {} tensor", self.output_name))
        })?;

        let (_, logits) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| MediaError::inference_failed(format!("Failed to extract tensor: {}", e)))?;

        if logits.len() != n {
            return Err(MediaError::inference_failed(format!(
                "Expected {} logits, got {}",
                n,
                logits.len()
            )));
        }

        Ok(logits.iter().map(|&logit| sigmoid(logit)).collect())
    }
}

impl FaceClassifier for OnnxClassifier {
    fn name(&self) -> &'static str {
        "onnx"
    }

    fn is_placeholder(&self) -> bool {
        false
    }

    fn predict(&self, batch: &[PreparedCrop]) -> MediaResult<Vec<f32>> {
        let mut scores = Vec::with_capacity(batch.len());
        for chunk in batch.chunks(self.batch_size) {
            scores.extend(self.run_chunk(chunk)?);
        }
        debug!(count = scores.len(), "Classifier inference completed");
        Ok(scores)
    }
}

/// Logistic function, saturating cleanly for large magnitudes.
pub fn sigmoid(x: f32) -> f32 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Stack prepared crops into one `[N, 3, 224, 224]` input tensor.
fn input_tensor(chunk: &[PreparedCrop]) -> MediaResult<Value> {
    let mut data = Vec::with_capacity(chunk.len() * TENSOR_LEN);
    for crop in chunk {
        if crop.tensor.len() != TENSOR_LEN {
            return Err(MediaError::inference_failed(format!(
                "crop {} has {} values, expected {}",
                crop.id,
                crop.tensor.len(),
                TENSOR_LEN
            )));
        }
        data.extend_from_slice(&crop.tensor);
    }

    let size = INPUT_SIZE as usize;
    let shape = vec![chunk.len(), 3, size, size];
    Tensor::from_array((shape, data.into_boxed_slice()))
        .map(Value::from)
        .map_err(|e| MediaError::inference_failed(format!("Failed to create tensor: {}", e)))
}

fn create_session(model_path: &Path) -> MediaResult<Session> {
    let model_bytes = std::fs::read(model_path)
        .map_err(|e| MediaError::internal(format!("Failed to read model file: {}", e)))?;

    let builder = Session::builder()
        .map_err(|e| MediaError::internal(format!("Failed to create session builder: {}", e)))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| MediaError::internal(format!("Failed to set optimization level: {}", e)))?;

    #[cfg(all(target_os = "linux", feature = "cuda"))]
    {
        use ort::execution_providers::CUDAExecutionProvider;
        if let Ok(cuda_builder) = builder
            .clone()
            .with_execution_providers([CUDAExecutionProvider::default().build()])
        {
            if let Ok(session) = cuda_builder.commit_from_memory(&model_bytes) {
                info!("Using CUDA execution provider for classification");
                return Ok(session);
            }
        }
        debug!("CUDA execution provider not available, using CPU");
    }

    builder
        .commit_from_memory(&model_bytes)
        .map_err(|e| MediaError::inference_failed(format!("Failed to load ONNX model: {}", e)))
}
