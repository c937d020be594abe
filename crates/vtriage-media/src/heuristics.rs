//! Model-free image quality heuristics.
//!
//! Both measures work on 8-bit luma:
//! - blur: variance of the 3x3 Laplacian response. Low values mean a soft
//!   image.
//! - banding: `1 - mean(sobel magnitude)` over luma scaled to [0, 1], with
//!   Sobel kernels divided by 4 and magnitude `sqrt((gx^2 + gy^2) / 2)`.
//!   High values mean few edges.
//!
//! With the `opencv` feature the filters run through `imgproc` with OpenCV
//! border rules (reflect-101 for the Laplacian, mirrored edge for Sobel).
//! Without it they run through `imageproc`, which clamps at the border.

use image::RgbImage;
use tracing::debug;
use vtriage_models::HeuristicScore;

use crate::error::MediaResult;

pub use backend::luma;

/// Variance of the Laplacian; higher is sharper.
pub fn blur_score(image: &RgbImage) -> MediaResult<f64> {
    backend::laplacian_variance(&luma(image)?)
}

/// `1 - mean` Sobel edge magnitude, clamped to [0, 1].
pub fn banding_score(image: &RgbImage) -> MediaResult<f64> {
    Ok(banding_from_edges(backend::mean_sobel_magnitude(&luma(image)?)?))
}

/// Both heuristics for one crop. `None` for an image without pixels or
/// when the filters fail.
pub fn score_crop(image: &RgbImage) -> Option<HeuristicScore> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return None;
    }

    let measure = || -> MediaResult<HeuristicScore> {
        let gray = luma(image)?;
        Ok(HeuristicScore {
            blur: backend::laplacian_variance(&gray)?,
            banding: banding_from_edges(backend::mean_sobel_magnitude(&gray)?),
        })
    };

    match measure() {
        Ok(score) => Some(score),
        Err(e) => {
            debug!("Heuristics failed on {}x{} crop: {}", width, height, e);
            None
        }
    }
}

fn banding_from_edges(mean_edge: f64) -> f64 {
    (1.0 - mean_edge).clamp(0.0, 1.0)
}

#[cfg(feature = "opencv")]
mod backend {
    use image::{GrayImage, RgbImage};
    use opencv::core::{self, Mat, BORDER_REFLECT, CV_64F};
    use opencv::imgproc;
    use opencv::prelude::*;

    use crate::cv::{cv_err, gray_to_mat, mat_to_gray, rgb_to_mat};
    use crate::error::MediaResult;

    /// BT.601 luma as computed by `cvtColor`.
    pub fn luma(image: &RgbImage) -> MediaResult<GrayImage> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Ok(GrayImage::new(width, height));
        }

        let rgb = rgb_to_mat(image)?;
        let mut gray = Mat::default();
        imgproc::cvt_color_def(&rgb, &mut gray, imgproc::COLOR_RGB2GRAY).map_err(cv_err)?;
        mat_to_gray(&gray)
    }

    pub fn laplacian_variance(gray: &GrayImage) -> MediaResult<f64> {
        let src = gray_to_mat(gray)?;

        let mut response = Mat::default();
        imgproc::laplacian_def(&src, &mut response, CV_64F).map_err(cv_err)?;

        let mut mean = Mat::default();
        let mut stddev = Mat::default();
        core::mean_std_dev_def(&response, &mut mean, &mut stddev).map_err(cv_err)?;

        let sigma = *stddev.at::<f64>(0).map_err(cv_err)?;
        Ok(sigma * sigma)
    }

    pub fn mean_sobel_magnitude(gray: &GrayImage) -> MediaResult<f64> {
        let src = gray_to_mat(gray)?;

        let mut unit = Mat::default();
        src.convert_to(&mut unit, CV_64F, 1.0 / 255.0, 0.0)
            .map_err(cv_err)?;

        let mut gx = Mat::default();
        let mut gy = Mat::default();
        imgproc::sobel(&unit, &mut gx, CV_64F, 1, 0, 3, 0.25, 0.0, BORDER_REFLECT)
            .map_err(cv_err)?;
        imgproc::sobel(&unit, &mut gy, CV_64F, 0, 1, 3, 0.25, 0.0, BORDER_REFLECT)
            .map_err(cv_err)?;

        let mut magnitude = Mat::default();
        core::magnitude(&gx, &gy, &mut magnitude).map_err(cv_err)?;

        let mean = core::mean_def(&magnitude).map_err(cv_err)?;
        Ok(mean[0] / std::f64::consts::SQRT_2)
    }
}

#[cfg(not(feature = "opencv"))]
mod backend {
    use image::{GrayImage, RgbImage};
    use imageproc::filter::laplacian_filter;
    use imageproc::gradients::{horizontal_sobel, vertical_sobel};

    use crate::error::MediaResult;

    /// Largest absolute response of an unscaled 3x3 Sobel kernel.
    const SOBEL_RANGE: f64 = 4.0 * 255.0;

    pub fn luma(image: &RgbImage) -> MediaResult<GrayImage> {
        Ok(image::imageops::grayscale(image))
    }

    pub fn laplacian_variance(gray: &GrayImage) -> MediaResult<f64> {
        if gray.width() == 0 || gray.height() == 0 {
            return Ok(0.0);
        }

        let response = laplacian_filter(gray);
        let values: Vec<f64> = response.pixels().map(|p| p[0] as f64).collect();

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        Ok(values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n)
    }

    pub fn mean_sobel_magnitude(gray: &GrayImage) -> MediaResult<f64> {
        if gray.width() == 0 || gray.height() == 0 {
            return Ok(0.0);
        }

        let gx = horizontal_sobel(gray);
        let gy = vertical_sobel(gray);

        let total: f64 = gx
            .pixels()
            .zip(gy.pixels())
            .map(|(x, y)| {
                let (x, y) = (x[0] as f64 / SOBEL_RANGE, y[0] as f64 / SOBEL_RANGE);
                ((x * x + y * y) / 2.0).sqrt()
            })
            .sum();

        Ok(total / (gray.width() as f64 * gray.height() as f64))
    }
}
