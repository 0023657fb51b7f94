//! Dimension alignment of the pattern and mask onto the original.
//!
//! The original's size is authoritative. Pattern and mask are stretched
//! to exactly that size (aspect ratio is not preserved) so every later
//! stage can work pixel-for-pixel.

use std::fmt;

use image::{ImageBuffer, Pixel};
use serde::{Deserialize, Serialize};

use crate::types::Dimensions;

/// Resampling filter used when stretching an input to the target size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResizeFilter {
    /// Nearest-neighbor: fastest, blocky artifacts.
    Nearest,
    /// Bilinear interpolation.
    #[default]
    Triangle,
    /// Bicubic (Catmull-Rom).
    CatmullRom,
    /// Gaussian: smooth output.
    Gaussian,
    /// Lanczos with 3 lobes: sharpest.
    Lanczos3,
}

impl ResizeFilter {
    /// Convert to the `image` crate's `FilterType`.
    const fn to_image_filter(self) -> image::imageops::FilterType {
        match self {
            Self::Nearest => image::imageops::FilterType::Nearest,
            Self::Triangle => image::imageops::FilterType::Triangle,
            Self::CatmullRom => image::imageops::FilterType::CatmullRom,
            Self::Gaussian => image::imageops::FilterType::Gaussian,
            Self::Lanczos3 => image::imageops::FilterType::Lanczos3,
        }
    }
}

impl fmt::Display for ResizeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nearest => f.write_str("Nearest"),
            Self::Triangle => f.write_str("Triangle"),
            Self::CatmullRom => f.write_str("CatmullRom"),
            Self::Gaussian => f.write_str("Gaussian"),
            Self::Lanczos3 => f.write_str("Lanczos3"),
        }
    }
}

/// Stretch `image` to exactly `target`.
///
/// Returns the (possibly unchanged) image and whether resampling was
/// actually applied. An image already at `target` is passed through
/// untouched so no filter softening is introduced.
#[must_use]
pub fn align<P>(
    image: ImageBuffer<P, Vec<P::Subpixel>>,
    target: Dimensions,
    filter: ResizeFilter,
) -> (ImageBuffer<P, Vec<P::Subpixel>>, bool)
where
    P: Pixel + 'static,
    P::Subpixel: 'static,
{
    if image.dimensions() == (target.width, target.height) {
        return (image, false);
    }

    let resized = image::imageops::resize(
        &image,
        target.width,
        target.height,
        filter.to_image_filter(),
    );
    (resized, true)
}
