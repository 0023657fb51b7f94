//! In-memory PNG encoding of the result and intermediate stages.
//!
//! The encoder configuration is fixed so that decoding an output and
//! encoding it again yields byte-identical PNG data.

use image::ImageEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};

use crate::types::{GrayImage, PipelineError, RgbImage};

/// MIME type of [`encode_png`] output.
pub const PNG_MIME: &str = "image/png";

/// Encode an RGB image as PNG bytes.
///
/// # Errors
///
/// Returns [`PipelineError::Encode`] if the encoder rejects the buffer.
pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>, PipelineError> {
    write_png(
        image.as_raw(),
        image.width(),
        image.height(),
        image::ExtendedColorType::Rgb8,
    )
}

/// Encode a single-channel image (mask or shading map) as PNG bytes.
///
/// # Errors
///
/// Returns [`PipelineError::Encode`] if the encoder rejects the buffer.
pub fn encode_png_gray(image: &GrayImage) -> Result<Vec<u8>, PipelineError> {
    write_png(
        image.as_raw(),
        image.width(),
        image.height(),
        image::ExtendedColorType::L8,
    )
}

fn write_png(
    raw: &[u8],
    width: u32,
    height: u32,
    color: image::ExtendedColorType,
) -> Result<Vec<u8>, PipelineError> {
    let mut buf = Vec::new();
    let encoder =
        PngEncoder::new_with_quality(&mut buf, CompressionType::Default, FilterType::Adaptive);
    encoder
        .write_image(raw, width, height, color)
        .map_err(PipelineError::Encode)?;
    Ok(buf)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::{Luma, Rgb};

    use super::*;

    fn sample() -> RgbImage {
        RgbImage::from_fn(23, 17, |x, y| Rgb([(x * 11) as u8, (y * 13) as u8, ((x ^ y) * 7) as u8]))
    }

    #[test]
    fn output_is_png() {
        let png = encode_png(&sample()).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
        assert_eq!(
            image::guess_format(&png).unwrap(),
            image::ImageFormat::Png
        );
    }

    #[test]
    fn decode_preserves_pixels() {
        let img = sample();
        let png = encode_png(&img).unwrap();
        let decoded = image::load_from_memory(&png).unwrap().to_rgb8();
        assert_eq!(decoded.as_raw(), img.as_raw());
    }

    #[test]
    fn re_encoding_is_byte_identical() {
        let first = encode_png(&sample()).unwrap();
        let decoded = image::load_from_memory(&first).unwrap().to_rgb8();
        let second = encode_png(&decoded).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn gray_stays_single_channel() {
        let mask = GrayImage::from_fn(9, 4, |x, _| Luma([(x * 28) as u8]));
        let png = encode_png_gray(&mask).unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!(decoded.color(), image::ColorType::L8);
        assert_eq!(decoded.to_luma8().as_raw(), mask.as_raw());
    }
}
