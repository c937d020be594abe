//! Copies between `image` buffers and OpenCV matrices.

use image::{GrayImage, RgbImage};
use opencv::core::{Mat, Scalar, CV_8UC1, CV_8UC3};
use opencv::prelude::*;

use crate::error::{MediaError, MediaResult};

pub(crate) fn cv_err(e: opencv::Error) -> MediaError {
    MediaError::detection_failed(format!("opencv: {e}"))
}

/// Copy an RGB buffer into a `CV_8UC3` matrix. Channel order stays RGB.
pub(crate) fn rgb_to_mat(image: &RgbImage) -> MediaResult<Mat> {
    filled_mat(image.height(), image.width(), CV_8UC3, image.as_raw())
}

/// Copy a grayscale buffer into a `CV_8UC1` matrix.
pub(crate) fn gray_to_mat(image: &GrayImage) -> MediaResult<Mat> {
    filled_mat(image.height(), image.width(), CV_8UC1, image.as_raw())
}

/// Copy a continuous `CV_8UC1` matrix back into a grayscale buffer.
pub(crate) fn mat_to_gray(mat: &Mat) -> MediaResult<GrayImage> {
    let (rows, cols) = (mat.rows(), mat.cols());
    let bytes = mat.data_bytes().map_err(cv_err)?;

    GrayImage::from_raw(cols as u32, rows as u32, bytes.to_vec())
        .ok_or_else(|| MediaError::internal(format!("unexpected {rows}x{cols} gray matrix size")))
}

fn filled_mat(rows: u32, cols: u32, typ: i32, data: &[u8]) -> MediaResult<Mat> {
    let mut mat = Mat::new_rows_cols_with_default(rows as i32, cols as i32, typ, Scalar::all(0.0))
        .map_err(cv_err)?;

    let dst = mat.data_bytes_mut().map_err(cv_err)?;
    if dst.len() != data.len() {
        return Err(MediaError::internal(format!(
            "buffer of {} bytes does not fit a {}x{} matrix",
            data.len(),
            rows,
            cols
        )));
    }
    dst.copy_from_slice(data);
    Ok(mat)
}
