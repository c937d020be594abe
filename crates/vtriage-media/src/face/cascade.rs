//! OpenCV Haar cascade detector.

use image::GrayImage;
use opencv::core::{Rect, Size, Vector};
use opencv::objdetect::CascadeClassifier;
use opencv::prelude::*;
use std::path::Path;
use std::sync::Mutex;
use vtriage_models::PixelRect;

use super::FaceLocator;
use crate::cv::{cv_err, gray_to_mat};
use crate::error::{MediaError, MediaResult};

const SCALE_FACTOR: f64 = 1.1;
const MIN_NEIGHBORS: i32 = 4;

/// Face locator backed by a `haarcascade_frontalface_default.xml` style file.
pub struct HaarCascadeLocator {
    cascade: Mutex<CascadeClassifier>,
    min_face_size: u32,
}

impl HaarCascadeLocator {
    pub fn from_file(path: &Path, min_face_size: u32) -> MediaResult<Self> {
        if !path.exists() {
            return Err(MediaError::model_not_found(path.display().to_string()));
        }

        let path_str = path
            .to_str()
            .ok_or_else(|| MediaError::detection_failed("Cascade path is not valid UTF-8"))?;

        let cascade = CascadeClassifier::new(path_str)
            .map_err(|e| MediaError::detection_failed(format!("Failed to load cascade: {}", e)))?;

        if cascade.empty().map_err(cv_err)? {
            return Err(MediaError::detection_failed(format!(
                "Cascade {} is empty",
                path.display()
            )));
        }

        Ok(Self {
            cascade: Mutex::new(cascade),
            min_face_size,
        })
    }
}

impl FaceLocator for HaarCascadeLocator {
    fn name(&self) -> &'static str {
        "haar_cascade"
    }

    fn locate(&self, gray: &GrayImage) -> MediaResult<Vec<PixelRect>> {
        let (width, height) = gray.dimensions();
        if width == 0 || height == 0 {
            return Ok(Vec::new());
        }

        let mat = gray_to_mat(gray)?;

        let mut faces = Vector::<Rect>::new();
        let min = self.min_face_size as i32;
        {
            let mut cascade = self
                .cascade
                .lock()
                .map_err(|_| MediaError::internal("Cascade lock poisoned"))?;
            cascade
                .detect_multi_scale(
                    &mat,
                    &mut faces,
                    SCALE_FACTOR,
                    MIN_NEIGHBORS,
                    0,
                    Size::new(min, min),
                    Size::new(0, 0),
                )
                .map_err(cv_err)?;
        }

        Ok(faces
            .iter()
            .filter_map(|r| {
                PixelRect::clipped(
                    r.x as i64,
                    r.y as i64,
                    r.width as i64,
                    r.height as i64,
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
    fn test_missing_cascade_is_model_not_found() {
        let err = HaarCascadeLocator::from_file(Path::new("/no/such/cascade.xml"), 40)
            .err()
            .unwrap();
        assert!(matches!(err, MediaError::ModelNotFound(_)));
    }

    #[test]
    fn test_empty_cascade_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cascade.xml");
        std::fs::write(&path, b"<opencv_storage></opencv_storage>").unwrap();

        assert!(HaarCascadeLocator::from_file(&path, 40).is_err());
    }
}
