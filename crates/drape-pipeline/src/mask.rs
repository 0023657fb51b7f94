//! Optional mask refinement: hard threshold and Gaussian feathering.
//!
//! Masks from segmentation tools often carry noisy low values or
//! jagged edges. Thresholding snaps the mask to pure black/white and
//! feathering softens the boundary back into a narrow linear ramp, which
//! the weighted composite turns into an antialiased edge.

use image::{GrayImage, Luma};
use imageproc::contrast::ThresholdType;

/// Apply an optional threshold followed by an optional feather.
///
/// With `threshold == None` and a non-positive `feather_sigma` the mask
/// is returned unchanged.
#[must_use = "returns the refined mask"]
pub fn refine_mask(mask: &GrayImage, threshold: Option<u8>, feather_sigma: f32) -> GrayImage {
    let thresholded = match threshold {
        Some(level) => binarize(mask, level),
        None => mask.clone(),
    };

    // imageproc panics on non-positive sigma.
    if feather_sigma <= 0.0 {
        return thresholded;
    }
    imageproc::filter::gaussian_blur_f32(&thresholded, feather_sigma)
}

/// Map every value `>= level` to 255 and everything else to 0.
///
/// `level` is inclusive, so `128` keeps `128` and drops `127`. imageproc's
/// binary threshold is strict, hence `level - 1`.
#[must_use = "returns the binarized mask"]
pub fn binarize(mask: &GrayImage, level: u8) -> GrayImage {
    match level.checked_sub(1) {
        Some(cut) => imageproc::contrast::threshold(mask, cut, ThresholdType::Binary),
        None => GrayImage::from_pixel(mask.width(), mask.height(), Luma([255])),
    }
}

/// Mean mask weight in `[0, 1]`: the fraction of the image the pattern
/// covers.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn coverage(mask: &GrayImage) -> f64 {
    let total: u64 = mask.pixels().map(|p| u64::from(p.0[0])).sum();
    let count = u64::from(mask.width()) * u64::from(mask.height());
    if count == 0 {
        return 0.0;
    }
    total as f64 / (count as f64 * 255.0)
}
