//! Face location.
//!
//! A [`FaceLocator`] finds face boxes in a grayscale frame. [`locate_faces`]
//! turns those boxes into RGB crops and guarantees at least one crop per
//! frame: when nothing is found the whole frame is used instead.

mod seeta;

#[cfg(feature = "opencv")]
mod cascade;

#[cfg(feature = "opencv")]
pub use cascade::HaarCascadeLocator;
pub use seeta::SeetaLocator;

use image::{GrayImage, RgbImage};
use std::sync::Arc;
use tracing::{debug, info, warn};
use vtriage_models::{CropId, FrameRef, PixelRect};

use crate::config::FaceLocatorConfig;
use crate::error::MediaResult;
use crate::heuristics::luma;

/// Detector over grayscale frames.
pub trait FaceLocator: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Face boxes in `gray` pixel coordinates.
    fn locate(&self, gray: &GrayImage) -> MediaResult<Vec<PixelRect>>;
}

/// Locator that never finds anything, so every frame is analyzed whole.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFaceLocator;

impl FaceLocator for NoFaceLocator {
    fn name(&self) -> &'static str {
        "none"
    }

    fn locate(&self, _gray: &GrayImage) -> MediaResult<Vec<PixelRect>> {
        Ok(Vec::new())
    }
}

/// One region of a frame handed to heuristics and the classifier.
#[derive(Debug, Clone)]
pub struct FaceCrop {
    pub id: CropId,
    pub frame: FrameRef,
    pub bbox: PixelRect,
    pub image: RgbImage,
    /// True when this crop is the whole frame because no face was found
    pub full_frame: bool,
}

/// All crops taken from one frame.
#[derive(Debug, Clone)]
pub struct FrameCrops {
    pub frame: FrameRef,
    pub crops: Vec<FaceCrop>,
    /// True when detection found nothing and the frame fell back to one crop
    pub full_frame: bool,
}

impl FrameCrops {
    pub fn len(&self) -> usize {
        self.crops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.crops.is_empty()
    }
}

/// Locate faces in `image` and crop them out.
///
/// Detector errors are logged and treated as zero detections. Boxes are
/// clipped to the frame; boxes left empty after clipping are discarded.
pub fn locate_faces(locator: &dyn FaceLocator, frame: &FrameRef, image: &RgbImage) -> FrameCrops {
    let (width, height) = image.dimensions();
    let boxes = match luma(image).and_then(|gray| locator.locate(&gray)) {
        Ok(boxes) => boxes,
        Err(e) => {
            warn!(
                frame = %frame.index,
                locator = locator.name(),
                "Face detection failed, using full frame: {}", e
            );
            Vec::new()
        }
    };

    let boxes: Vec<PixelRect> = boxes
        .into_iter()
        .filter_map(|b| {
            PixelRect::clipped(
                b.x as i64,
                b.y as i64,
                b.width as i64,
                b.height as i64,
                width,
                height,
            )
        })
        .collect();

    if boxes.is_empty() {
        let bbox = PixelRect::full(width, height);
        debug!(frame = %frame.index, "No faces found, using full frame");
        return FrameCrops {
            frame: frame.clone(),
            crops: vec![FaceCrop {
                id: CropId::new(frame.index, 0),
                frame: frame.clone(),
                bbox,
                image: image.clone(),
                full_frame: true,
            }],
            full_frame: true,
        };
    }

    let crops = boxes
        .into_iter()
        .enumerate()
        .map(|(i, bbox)| FaceCrop {
            id: CropId::new(frame.index, i as u32),
            frame: frame.clone(),
            bbox,
            image: image::imageops::crop_imm(image, bbox.x, bbox.y, bbox.width, bbox.height)
                .to_image(),
            full_frame: false,
        })
        .collect();

    FrameCrops {
        frame: frame.clone(),
        crops,
        full_frame: false,
    }
}

/// Pick the best available locator: Haar cascade, then SeetaFace, then none.
pub fn build_locator(config: &FaceLocatorConfig) -> Arc<dyn FaceLocator> {
    #[cfg(feature = "opencv")]
    if let Some(path) = config.cascade_path.as_deref().filter(|p| p.exists()) {
        match HaarCascadeLocator::from_file(path, config.min_face_size) {
            Ok(locator) => {
                info!("Using Haar cascade face locator from {}", path.display());
                return Arc::new(locator);
            }
            Err(e) => warn!("Failed to load Haar cascade {}: {}", path.display(), e),
        }
    }

    if let Some(path) = config.seeta_model_path.as_deref().filter(|p| p.exists()) {
        match SeetaLocator::from_file(path, config.min_face_size) {
            Ok(locator) => {
                info!("Using SeetaFace locator from {}", path.display());
                return Arc::new(locator);
            }
            Err(e) => warn!("Failed to load SeetaFace model {}: {}", path.display(), e),
        }
    }

    warn!("No face detection model available, analyzing whole frames");
    Arc::new(NoFaceLocator)
}
