//! Shading extraction and transfer.
//!
//! The masked object is isolated against white and reduced to luma,
//! giving a map where 255 means "lit" and darker values mean shadow or
//! fold. Multiplying the pattern by that map makes the pattern inherit
//! the object's lighting.

use image::{GrayImage, Luma, Rgb, RgbImage};

/// Luma of an RGB pixel using ITU-R 601-2 weights
/// (`0.299*R + 0.587*G + 0.114*B`), rounded to nearest.
#[must_use]
pub fn luma(px: Rgb<u8>) -> u8 {
    let [r, g, b] = px.0;
    let weighted = u32::from(r) * 299 + u32::from(g) * 587 + u32::from(b) * 114;
    // Max is 255 * 1000, so the quotient always fits.
    u8::try_from((weighted + 500) / 1000).unwrap_or(u8::MAX)
}

/// Weighted select between two channel values: `m/255 * a + (1 - m/255) * b`,
/// rounded to nearest.
#[must_use]
pub const fn mix(a: u8, b: u8, m: u8) -> u8 {
    let m = m as u32;
    let v = (m * a as u32 + (255 - m) * b as u32 + 127) / 255;
    // v <= 255 because it is a convex combination.
    v as u8
}

/// Normalized multiply: `a * b / 255`, rounded to nearest.
///
/// `255` is the identity and `0` drives the result to black.
#[must_use]
pub const fn multiply(a: u8, b: u8) -> u8 {
    ((a as u32 * b as u32 + 127) / 255) as u8
}

/// Build the shading map of the masked region of `original`.
///
/// Each pixel is first mixed toward white by the mask weight (255 keeps
/// the original, 0 gives white), then converted to luma. Unmasked areas
/// therefore read as 255.
///
/// `original` and `mask` must share dimensions.
#[must_use = "returns the shading map"]
pub fn extract_shading(original: &RgbImage, mask: &GrayImage) -> GrayImage {
    debug_assert_eq!(original.dimensions(), mask.dimensions());
    GrayImage::from_fn(original.width(), original.height(), |x, y| {
        let m = mask.get_pixel(x, y).0[0];
        let Rgb([r, g, b]) = *original.get_pixel(x, y);
        let isolated = Rgb([mix(r, 255, m), mix(g, 255, m), mix(b, 255, m)]);
        Luma([luma(isolated)])
    })
}

/// Multiply every channel of `pattern` by the shading map.
///
/// Equivalent to replicating the map into three channels and doing a
/// per-channel normalized multiply.
#[must_use = "returns the shaded pattern"]
pub fn transfer_shading(pattern: &RgbImage, shading: &GrayImage) -> RgbImage {
    debug_assert_eq!(pattern.dimensions(), shading.dimensions());
    RgbImage::from_fn(pattern.width(), pattern.height(), |x, y| {
        let s = shading.get_pixel(x, y).0[0];
        let Rgb([r, g, b]) = *pattern.get_pixel(x, y);
        Rgb([multiply(r, s), multiply(g, s), multiply(b, s)])
    })
}

/// Mean shading value over pixels with a non-zero mask weight, weighted
/// by the mask. Returns `None` when the mask is empty.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn mean_masked_shading(shading: &GrayImage, mask: &GrayImage) -> Option<f64> {
    let (weighted, weight) = shading
        .pixels()
        .zip(mask.pixels())
        .fold((0_u64, 0_u64), |(sum, w), (s, m)| {
            let m = u64::from(m.0[0]);
            (sum + u64::from(s.0[0]) * m, w + m)
        });
    (weight > 0).then(|| weighted as f64 / weight as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn luma_extremes_and_weights() {
        assert_eq!(luma(Rgb([255, 255, 255])), 255);
        assert_eq!(luma(Rgb([0, 0, 0])), 0);
        assert_eq!(luma(Rgb([128, 128, 128])), 128);
        assert_eq!(luma(Rgb([255, 0, 0])), 76);
        assert_eq!(luma(Rgb([0, 255, 0])), 150);
        assert_eq!(luma(Rgb([0, 0, 255])), 29);
    }

    #[test]
    fn luma_uses_601_weights_not_to_luma8() {
        let red = RgbImage::from_pixel(1, 1, Rgb([255, 0, 0]));
        let rec709 = image::DynamicImage::ImageRgb8(red).to_luma8().get_pixel(0, 0).0[0];
        assert_eq!(luma(Rgb([255, 0, 0])), 76);
        assert_ne!(rec709, 76);
    }

    #[test]
    fn multiply_identity_and_zero_and_commutes() {
        for v in 0..=255_u8 {
            assert_eq!(multiply(v, 255), v);
            assert_eq!(multiply(v, 0), 0);
        }
        assert_eq!(multiply(200, 64), multiply(64, 200));
        assert_eq!(multiply(128, 128), 64);
    }

    #[test]
    fn mix_selects_endpoints_exactly() {
        for v in 0..=255_u8 {
            assert_eq!(mix(v, 17, 255), v);
            assert_eq!(mix(17, v, 0), v);
        }
        assert_eq!(mix(0, 255, 128), 127);
    }

    #[test]
    fn unmasked_region_is_white() {
        let original = RgbImage::from_pixel(3, 3, Rgb([10, 20, 30]));
        let mask = GrayImage::from_pixel(3, 3, Luma([0]));
        let shading = extract_shading(&original, &mask);
        assert!(shading.pixels().all(|p| p.0[0] == 255));
    }

    #[test]
    fn masked_region_is_luma_of_original() {
        let original = RgbImage::from_fn(2, 1, |x, _| {
            if x == 0 {
                Rgb([128, 128, 128])
            } else {
                Rgb([0, 255, 0])
            }
        });
        let mask = GrayImage::from_pixel(2, 1, Luma([255]));
        let shading = extract_shading(&original, &mask);
        assert_eq!(shading.get_pixel(0, 0).0[0], 128);
        assert_eq!(shading.get_pixel(1, 0).0[0], 150);
    }

    #[test]
    fn white_shading_leaves_pattern_unchanged() {
        let pattern = RgbImage::from_fn(4, 4, |x, y| Rgb([(x * 60) as u8, (y * 60) as u8, 99]));
        let shading = GrayImage::from_pixel(4, 4, Luma([255]));
        let shaded = transfer_shading(&pattern, &shading);
        assert_eq!(shaded.as_raw(), pattern.as_raw());
    }

    #[test]
    fn mid_gray_shading_scales_pattern() {
        let pattern = RgbImage::from_pixel(2, 2, Rgb([200, 100, 50]));
        let shading = GrayImage::from_pixel(2, 2, Luma([128]));
        let shaded = transfer_shading(&pattern, &shading);
        for p in shaded.pixels() {
            for (got, src) in p.0.iter().zip([200_u8, 100, 50]) {
                let expected = f64::from(src) * 128.0 / 255.0;
                assert!(
                    (f64::from(*got) - expected).abs() <= 0.5,
                    "got {got}, expected ~{expected}",
                );
            }
        }
    }

    #[test]
    fn mean_masked_shading_ignores_unmasked_pixels() {
        let shading = GrayImage::from_fn(2, 1, |x, _| if x == 0 { Luma([100]) } else { Luma([255]) });
        let mask = GrayImage::from_fn(2, 1, |x, _| if x == 0 { Luma([255]) } else { Luma([0]) });
        let mean = mean_masked_shading(&shading, &mask).unwrap_or_default();
        assert!((mean - 100.0).abs() < 1e-12);
        assert!(mean_masked_shading(&shading, &GrayImage::new(2, 1)).is_none());
    }
}
