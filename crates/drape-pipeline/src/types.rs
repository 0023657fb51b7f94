//! Shared types for the drape compositing pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::align::ResizeFilter;
use crate::diagnostics::CompositeDiagnostics;

/// Re-export `RgbImage` so downstream crates can hold pipeline inputs
/// and outputs without depending on `image` directly.
pub use image::RgbImage;

/// Re-export `GrayImage` for masks and shading maps.
pub use image::GrayImage;

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Create dimensions from a width and height.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Total number of pixels (`width * height`).
    #[must_use]
    pub const fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl From<(u32, u32)> for Dimensions {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Which of the three pipeline inputs an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputKind {
    /// The source photograph.
    Original,
    /// The fabric/texture image.
    Pattern,
    /// The grayscale selector image.
    Mask,
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Original => f.write_str("original image"),
            Self::Pattern => f.write_str("pattern image"),
            Self::Mask => f.write_str("mask"),
        }
    }
}

/// Configuration for the compositing pipeline.
///
/// The defaults give bilinear alignment,
/// the soft mask used as-is, and a final blend of `0.8` toward the
/// composite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositeConfig {
    /// Weight of the composite in the final blend against the untouched
    /// original. `1.0` returns the composite, `0.0` the original.
    pub blend_alpha: f32,

    /// Resampling filter used to stretch the pattern and mask onto the
    /// original's dimensions.
    pub resize_filter: ResizeFilter,

    /// Binarize the aligned mask at this level (`v >= t` becomes 255,
    /// everything else 0). `None` keeps the soft mask.
    pub mask_threshold: Option<u8>,

    /// Gaussian sigma used to feather the mask edge after thresholding.
    /// Non-positive values disable feathering.
    pub mask_feather_sigma: f32,

    /// Largest accepted `width * height` for any decoded input. Checked
    /// from the image header before the pixel data is decoded.
    pub max_pixels: u64,
}

impl CompositeConfig {
    /// Default final blend factor.
    pub const DEFAULT_BLEND_ALPHA: f32 = 0.8;

    /// Default resampling filter for pattern and mask alignment.
    pub const DEFAULT_RESIZE_FILTER: ResizeFilter = ResizeFilter::Triangle;

    /// Default feather sigma (disabled).
    pub const DEFAULT_MASK_FEATHER_SIGMA: f32 = 0.0;

    /// Default pixel-count ceiling per input image (16 MP, roughly
    /// 4900x3300).
    pub const DEFAULT_MAX_PIXELS: u64 = 16_000_000;

    /// Check the configuration for values the pipeline cannot honor.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if `blend_alpha` is not a
    /// finite value in `[0, 1]`, `mask_feather_sigma` is not finite, or
    /// `max_pixels` is zero.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !self.blend_alpha.is_finite() || !(0.0..=1.0).contains(&self.blend_alpha) {
            return Err(PipelineError::InvalidConfig(format!(
                "blend_alpha must be within [0, 1], got {}",
                self.blend_alpha
            )));
        }
        if !self.mask_feather_sigma.is_finite() {
            return Err(PipelineError::InvalidConfig(format!(
                "mask_feather_sigma must be finite, got {}",
                self.mask_feather_sigma
            )));
        }
        if self.max_pixels == 0 {
            return Err(PipelineError::InvalidConfig(
                "max_pixels must be greater than zero".to_owned(),
            ));
        }
        Ok(())
    }
}

impl Default for CompositeConfig {
    fn default() -> Self {
        Self {
            blend_alpha: Self::DEFAULT_BLEND_ALPHA,
            resize_filter: Self::DEFAULT_RESIZE_FILTER,
            mask_threshold: None,
            mask_feather_sigma: Self::DEFAULT_MASK_FEATHER_SIGMA,
            max_pixels: Self::DEFAULT_MAX_PIXELS,
        }
    }
}

/// Result of running the pipeline with every intermediate preserved.
///
/// All rasters share [`dimensions`](Self::dimensions), which are the
/// original's.
#[derive(Debug, Clone)]
pub struct StagedResult {
    /// Decoded source photograph (never resized).
    pub original: RgbImage,
    /// Pattern stretched to the original's dimensions.
    pub pattern: RgbImage,
    /// Mask aligned to the original and optionally refined.
    pub mask: GrayImage,
    /// Grayscale shading map of the masked object on white.
    pub shading: GrayImage,
    /// Pattern multiplied by the shading map.
    pub pattern_shaded: RgbImage,
    /// Shaded pattern placed into the masked region of the original.
    pub composited: RgbImage,
    /// Final output: the composite blended back toward the original.
    pub result: RgbImage,
    /// Dimensions shared by every raster above.
    pub dimensions: Dimensions,
    /// Per-stage timings and metrics.
    pub diagnostics: CompositeDiagnostics,
}

/// Coarse classification of [`PipelineError`] for boundary layers that
/// map failures onto status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// An input was absent or empty.
    MissingInput,
    /// The mask data URL could not be parsed or decoded.
    MalformedMask,
    /// The original or pattern bytes were not a supported image.
    Decode,
    /// An input exceeded the configured pixel ceiling.
    TooLarge,
    /// The pipeline configuration was rejected.
    InvalidConfig,
    /// The result could not be encoded.
    Encode,
}

/// Errors that can occur during compositing.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// An input was absent or empty.
    #[error("missing {0}")]
    MissingInput(InputKind),

    /// The mask is not a usable `data:<mime>;base64,<payload>` URL.
    #[error("malformed mask data URL: {0}")]
    MalformedMask(String),

    /// The original or pattern bytes could not be decoded.
    #[error("failed to decode {input}: {source}")]
    Decode {
        /// Which input failed.
        input: InputKind,
        /// Underlying decoder error.
        #[source]
        source: image::ImageError,
    },

    /// An input's header reports more pixels than allowed.
    #[error("{input} is {width}x{height}, exceeding the limit of {max_pixels} pixels")]
    TooLarge {
        /// Which input was rejected.
        input: InputKind,
        /// Width reported by the image header.
        width: u32,
        /// Height reported by the image header.
        height: u32,
        /// Configured ceiling.
        max_pixels: u64,
    },

    /// Pipeline configuration is invalid.
    #[error("invalid composite configuration: {0}")]
    InvalidConfig(String),

    /// PNG encoding of the result failed.
    #[error("failed to encode result: {0}")]
    Encode(#[source] image::ImageError),
}

impl PipelineError {
    /// The coarse kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingInput(_) => ErrorKind::MissingInput,
            Self::MalformedMask(_) => ErrorKind::MalformedMask,
            Self::Decode { .. } => ErrorKind::Decode,
            Self::TooLarge { .. } => ErrorKind::TooLarge,
            Self::InvalidConfig(_) => ErrorKind::InvalidConfig,
            Self::Encode(_) => ErrorKind::Encode,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn dimensions_pixel_count_does_not_overflow_u32() {
        let d = Dimensions::new(100_000, 100_000);
        assert_eq!(d.pixel_count(), 10_000_000_000);
    }

    #[test]
    fn dimensions_display() {
        assert_eq!(Dimensions::new(100, 80).to_string(), "100x80");
    }

    #[test]
    fn config_defaults() {
        let config = CompositeConfig::default();
        assert!((config.blend_alpha - 0.8).abs() < f32::EPSILON);
        assert_eq!(config.resize_filter, ResizeFilter::Triangle);
        assert_eq!(config.mask_threshold, None);
        assert!(config.mask_feather_sigma.abs() < f32::EPSILON);
        assert_eq!(config.max_pixels, 16_000_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_rejects_alpha_out_of_range() {
        for alpha in [-0.1, 1.5, f32::NAN] {
            let config = CompositeConfig {
                blend_alpha: alpha,
                ..CompositeConfig::default()
            };
            assert!(
                matches!(config.validate(), Err(PipelineError::InvalidConfig(_))),
                "alpha {alpha} should be rejected",
            );
        }
    }

    #[test]
    fn config_accepts_alpha_bounds() {
        for alpha in [0.0, 1.0] {
            let config = CompositeConfig {
                blend_alpha: alpha,
                ..CompositeConfig::default()
            };
            assert!(config.validate().is_ok());
        }
    }

    #[test]
    fn config_rejects_zero_max_pixels() {
        let config = CompositeConfig {
            max_pixels: 0,
            ..CompositeConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn config_partial_json_fills_defaults() {
        let config: CompositeConfig = serde_json::from_str(r#"{"blend_alpha": 0.5}"#).unwrap();
        assert!((config.blend_alpha - 0.5).abs() < f32::EPSILON);
        assert_eq!(config.max_pixels, CompositeConfig::DEFAULT_MAX_PIXELS);
    }

    #[test]
    fn error_display_messages() {
        assert_eq!(
            PipelineError::MissingInput(InputKind::Pattern).to_string(),
            "missing pattern image",
        );
        let err = PipelineError::TooLarge {
            input: InputKind::Original,
            width: 10,
            height: 20,
            max_pixels: 100,
        };
        assert_eq!(
            err.to_string(),
            "original image is 10x20, exceeding the limit of 100 pixels",
        );
    }

    #[test]
    fn error_kind_lookup() {
        assert_eq!(
            PipelineError::MalformedMask("x".to_owned()).kind(),
            ErrorKind::MalformedMask,
        );
        assert_eq!(
            PipelineError::MissingInput(InputKind::Mask).kind(),
            ErrorKind::MissingInput,
        );
    }
}
