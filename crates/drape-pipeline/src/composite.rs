//! Masked composite and final alpha blend.

use image::{GrayImage, Rgb, RgbImage};

use crate::shading::mix;

/// Place `foreground` over `background` weighted by `mask`.
///
/// Per channel: `m/255 * fg + (1 - m/255) * bg`. A mask of 255 yields
/// the foreground exactly, 0 yields the background exactly, and
/// intermediate values give a linear blend for soft edges.
///
/// All three images must share dimensions.
#[must_use = "returns the composited image"]
pub fn masked_composite(foreground: &RgbImage, background: &RgbImage, mask: &GrayImage) -> RgbImage {
    debug_assert_eq!(foreground.dimensions(), background.dimensions());
    debug_assert_eq!(foreground.dimensions(), mask.dimensions());
    RgbImage::from_fn(background.width(), background.height(), |x, y| {
        let m = mask.get_pixel(x, y).0[0];
        let Rgb([fr, fg, fb]) = *foreground.get_pixel(x, y);
        let Rgb([br, bg, bb]) = *background.get_pixel(x, y);
        Rgb([mix(fr, br, m), mix(fg, bg, m), mix(fb, bb, m)])
    })
}

/// Linear interpolation `base * (1 - alpha) + overlay * alpha`, rounded
/// and clamped to `[0, 255]`.
///
/// `alpha` is clamped to `[0, 1]`. Where `overlay` equals `base` the
/// output equals `base` exactly.
#[must_use = "returns the blended image"]
pub fn blend(base: &RgbImage, overlay: &RgbImage, alpha: f32) -> RgbImage {
    debug_assert_eq!(base.dimensions(), overlay.dimensions());
    let alpha = alpha.clamp(0.0, 1.0);
    RgbImage::from_fn(base.width(), base.height(), |x, y| {
        let b = base.get_pixel(x, y).0;
        let o = overlay.get_pixel(x, y).0;
        Rgb(std::array::from_fn(|c| lerp(b[c], o[c], alpha)))
    })
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn lerp(a: u8, b: u8, t: f32) -> u8 {
    let a = f32::from(a);
    let v = (f32::from(b) - a).mul_add(t, a);
    v.round().clamp(0.0, 255.0) as u8
}
