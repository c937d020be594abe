//! Classifier input preparation.

use image::imageops::{self, FilterType};
use image::RgbImage;
use vtriage_models::CropId;

use crate::error::{MediaError, MediaResult};

/// Side length of the square classifier input.
pub const INPUT_SIZE: u32 = 224;

/// Per-channel ImageNet mean.
pub const MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// Per-channel ImageNet standard deviation.
pub const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Number of floats in one prepared crop.
pub const TENSOR_LEN: usize = 3 * (INPUT_SIZE as usize) * (INPUT_SIZE as usize);

/// A crop converted to a normalised CHW tensor.
#[derive(Debug, Clone)]
pub struct PreparedCrop {
    pub id: CropId,
    /// `3 x 224 x 224` values, channel-major
    pub tensor: Vec<f32>,
}

/// Resize a crop straight to 224x224 and normalise it for the classifier.
/// The aspect ratio is not kept.
pub fn preprocess(id: CropId, image: &RgbImage) -> MediaResult<PreparedCrop> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(MediaError::preprocess_failed(format!(
            "crop {} is empty ({}x{})",
            id, width, height
        )));
    }

    let resized = imageops::resize(image, INPUT_SIZE, INPUT_SIZE, FilterType::Triangle);

    let plane = (INPUT_SIZE * INPUT_SIZE) as usize;
    let mut tensor = vec![0.0f32; TENSOR_LEN];
    for (x, y, pixel) in resized.enumerate_pixels() {
        let offset = (y * INPUT_SIZE + x) as usize;
        for c in 0..3 {
            let v = pixel[c] as f32 / 255.0;
            tensor[c * plane + offset] = (v - MEAN[c]) / STD[c];
        }
    }

    Ok(PreparedCrop { id, tensor })
}
