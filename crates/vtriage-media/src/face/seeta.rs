//! SeetaFace funnel-cascade detector (`rustface`).

use image::GrayImage;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use vtriage_models::PixelRect;

use super::FaceLocator;
use crate::error::{MediaError, MediaResult};

/// Face locator backed by a SeetaFace frontal model file.
pub struct SeetaLocator {
    model: rustface::Model,
    min_face_size: u32,
}

impl SeetaLocator {
    /// Load a model such as `seeta_fd_frontal_v1.0.bin`.
    pub fn from_file(path: &Path, min_face_size: u32) -> MediaResult<Self> {
        if !path.exists() {
            return Err(MediaError::model_not_found(path.display().to_string()));
        }

        let reader = BufReader::new(File::open(path)?);
        let model = rustface::read_model(reader).map_err(|e| {
            MediaError::detection_failed(format!(
                "Failed to read SeetaFace model {}: {}",
                path.display(),
                e
            ))
        })?;

        Ok(Self {
            model,
            min_face_size: min_face_size.max(20),
        })
    }
}

impl FaceLocator for SeetaLocator {
    fn name(&self) -> &'static str {
        "seeta"
    }

    fn locate(&self, gray: &GrayImage) -> MediaResult<Vec<PixelRect>> {
        let (width, height) = gray.dimensions();
        if width < self.min_face_size || height < self.min_face_size {
            return Ok(Vec::new());
        }

        // Detectors keep scratch state, so one is created per call.
        let mut detector = rustface::create_detector_with_model(self.model.clone());
        detector.set_min_face_size(self.min_face_size);
        detector.set_score_thresh(2.0);
        detector.set_pyramid_scale_factor(0.8);
        detector.set_slide_window_step(4, 4);

        let faces = detector.detect(&rustface::ImageData::new(gray.as_raw(), width, height));

        Ok(faces
            .iter()
            .filter_map(|face| {
                let bbox = face.bbox();
                PixelRect::clipped(
                    bbox.x() as i64,
                    bbox.y() as i64,
                    bbox.width() as i64,
                    bbox.height() as i64,
                    width,
                    height,
                )
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_file() {
        let result = SeetaLocator::from_file(Path::new("/no/such/seeta.bin"), 40);
        assert!(matches!(result, Err(MediaError::ModelNotFound(_))));
    }
}
