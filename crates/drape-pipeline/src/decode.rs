//! Image decoding and color-mode normalization.
//!
//! Accepts raw image bytes (PNG, JPEG, BMP, WebP) and produces either a
//! three-channel RGB image (original and pattern) or a single-channel
//! grayscale image (mask). Alpha is dropped, not composited.

use std::io::Cursor;

use image::{DynamicImage, GrayImage, ImageReader, RgbImage};

use crate::types::{Dimensions, InputKind, PipelineError};

/// Decode raw image bytes and convert to `RGB`.
///
/// Grayscale and palette images are expanded to three channels; an
/// alpha channel, if present, is discarded.
///
/// # Errors
///
/// Returns [`PipelineError::MissingInput`] if `bytes` is empty.
/// Returns [`PipelineError::TooLarge`] if the header reports more than
/// `max_pixels` pixels.
/// Returns [`PipelineError::Decode`] if the format is unrecognized or
/// the data is corrupt.
pub fn decode_rgb(
    bytes: &[u8],
    input: InputKind,
    max_pixels: u64,
) -> Result<RgbImage, PipelineError> {
    let image = decode(bytes, input, max_pixels)?;
    Ok(image.to_rgb8())
}

/// Decode raw mask bytes and convert to single-channel grayscale.
///
/// # Errors
///
/// Same as [`decode_rgb`], reported against [`InputKind::Mask`].
pub fn decode_mask_bytes(bytes: &[u8], max_pixels: u64) -> Result<GrayImage, PipelineError> {
    let image = decode(bytes, InputKind::Mask, max_pixels)?;
    Ok(image.to_luma8())
}

/// Read the header for the dimensions, enforce the pixel ceiling, then
/// decode the full image.
fn decode(bytes: &[u8], input: InputKind, max_pixels: u64) -> Result<DynamicImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::MissingInput(input));
    }

    let decode_err = |source| PipelineError::Decode { input, source };

    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| decode_err(image::ImageError::IoError(e)))?;
    let (width, height) = reader.into_dimensions().map_err(decode_err)?;
    if Dimensions::new(width, height).pixel_count() > max_pixels {
        return Err(PipelineError::TooLarge {
            input,
            width,
            height,
            max_pixels,
        });
    }

    image::load_from_memory(bytes).map_err(decode_err)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::{ImageEncoder, Rgba, RgbaImage};

    use super::*;

    const LIMIT: u64 = 1_000_000;

    fn encode_rgba(img: &RgbaImage) -> Vec<u8> {
        let mut buf = Vec::new();
        image::codecs::png::PngEncoder::new(&mut buf)
            .write_image(
                img.as_raw(),
                img.width(),
                img.height(),
                image::ExtendedColorType::Rgba8,
            )
            .unwrap();
        buf
    }

    fn encode_gray(img: &GrayImage) -> Vec<u8> {
        let mut buf = Vec::new();
        image::codecs::png::PngEncoder::new(&mut buf)
            .write_image(
                img.as_raw(),
                img.width(),
                img.height(),
                image::ExtendedColorType::L8,
            )
            .unwrap();
        buf
    }

    #[test]
    fn empty_input_is_missing() {
        let result = decode_rgb(&[], InputKind::Original, LIMIT);
        assert!(matches!(
            result,
            Err(PipelineError::MissingInput(InputKind::Original))
        ));
    }

    #[test]
    fn corrupt_bytes_return_decode_error_for_that_input() {
        let result = decode_rgb(&[0xFF, 0xFE, 0x00, 0x01], InputKind::Pattern, LIMIT);
        assert!(matches!(
            result,
            Err(PipelineError::Decode {
                input: InputKind::Pattern,
                ..
            })
        ));
    }

    #[test]
    fn alpha_is_dropped_not_composited() {
        let img = RgbaImage::from_pixel(3, 2, Rgba([200, 100, 50, 0]));
        let rgb = decode_rgb(&encode_rgba(&img), InputKind::Original, LIMIT).unwrap();
        assert_eq!(rgb.dimensions(), (3, 2));
        assert!(rgb.pixels().all(|p| p.0 == [200, 100, 50]));
    }

    #[test]
    fn grayscale_source_is_replicated_to_rgb() {
        let gray = GrayImage::from_pixel(2, 2, image::Luma([77]));
        let rgb = decode_rgb(&encode_gray(&gray), InputKind::Pattern, LIMIT).unwrap();
        assert!(rgb.pixels().all(|p| p.0 == [77, 77, 77]));
    }

    #[test]
    fn color_mask_is_reduced_to_one_channel() {
        let img = RgbaImage::from_pixel(4, 4, Rgba([255, 255, 255, 255]));
        let mask = decode_mask_bytes(&encode_rgba(&img), LIMIT).unwrap();
        assert_eq!(mask.dimensions(), (4, 4));
        assert!(mask.pixels().all(|p| p.0[0] == 255));
    }

    #[test]
    fn oversized_header_is_rejected_before_decode() {
        let img = RgbaImage::from_pixel(20, 10, Rgba([0, 0, 0, 255]));
        let result = decode_rgb(&encode_rgba(&img), InputKind::Original, 199);
        assert!(matches!(
            result,
            Err(PipelineError::TooLarge {
                input: InputKind::Original,
                width: 20,
                height: 10,
                max_pixels: 199,
            })
        ));
    }

    #[test]
    fn exactly_at_limit_is_accepted() {
        let img = RgbaImage::from_pixel(20, 10, Rgba([0, 0, 0, 255]));
        assert!(decode_rgb(&encode_rgba(&img), InputKind::Original, 200).is_ok());
    }
}
