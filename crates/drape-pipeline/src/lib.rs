//! drape-pipeline: Shading-preserving compositing pipeline (sans-IO).
//!
//! Places a fabric/texture pattern onto the masked region of a
//! photograph while keeping the object's folds, shadows, and highlights:
//! decode -> align -> (refine mask) -> extract shading -> transfer
//! shading -> masked composite -> blend -> encode.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! byte slices and image buffers. HTTP handling lives in `drape-server`
//! and file handling in `drape-cli`.

pub mod align;
pub mod composite;
pub mod data_url;
pub mod decode;
pub mod diagnostics;
pub mod encode;
pub mod mask;
pub mod shading;
pub mod types;

pub use align::ResizeFilter;
pub use diagnostics::CompositeDiagnostics;
pub use encode::PNG_MIME;
pub use types::{
    CompositeConfig, Dimensions, ErrorKind, GrayImage, InputKind, PipelineError, RgbImage,
    StagedResult,
};

use diagnostics::{Clock, CompositeSummary, StageDiagnostics, StageMetrics};

/// Encoded compositing output together with its diagnostics.
#[derive(Debug, Clone)]
pub struct Composite {
    /// PNG bytes of the result.
    pub png: Vec<u8>,
    /// Output dimensions (the original's).
    pub dimensions: Dimensions,
    /// Per-stage timings, including decode and encode.
    pub diagnostics: CompositeDiagnostics,
}

/// Run the full pipeline from encoded inputs to PNG bytes.
///
/// `original` and `pattern` are encoded images (PNG, JPEG, BMP, WebP);
/// `mask_data_url` is a `data:<mime>;base64,<payload>` string.
///
/// # Errors
///
/// See [`compose_staged`]; additionally returns
/// [`PipelineError::Encode`] if PNG encoding fails.
pub fn compose(
    original: &[u8],
    pattern: &[u8],
    mask_data_url: &str,
    config: &CompositeConfig,
) -> Result<Vec<u8>, PipelineError> {
    compose_with_diagnostics(original, pattern, mask_data_url, config).map(|c| c.png)
}

/// Like [`compose`], but also returns dimensions and diagnostics.
///
/// Unlike [`compose_staged`], each intermediate buffer is freed as soon
/// as the following stage has consumed it, so at most three full-size
/// colour buffers are alive at once.
///
/// # Errors
///
/// See [`compose`].
pub fn compose_with_diagnostics(
    original: &[u8],
    pattern: &[u8],
    mask_data_url: &str,
    config: &CompositeConfig,
) -> Result<Composite, PipelineError> {
    let decoded = decode_inputs(original, pattern, mask_data_url, config)?;
    let stages = run_stages::<DropEach>(decoded.original, decoded.pattern, decoded.mask, config)?;

    let clock = Clock::start();
    let png = encode::encode_png(&stages.result)?;
    let mut diagnostics = stages.diagnostics;
    diagnostics.decode = Some(decoded.diagnostics);
    diagnostics.encode = Some(clock.finish(StageMetrics::Encode {
        output_bytes: png.len(),
    }));
    diagnostics.update_total();
    Ok(Composite {
        png,
        dimensions: stages.dimensions,
        diagnostics,
    })
}

/// Decode the three inputs and run the pixel pipeline, keeping every
/// intermediate image.
///
/// Presence of all three inputs is checked before anything is decoded;
/// the first absent one (in original, pattern, mask order) is reported.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] for a rejected config,
/// [`PipelineError::MissingInput`] if any input is empty,
/// [`PipelineError::Decode`] if the original or pattern cannot be decoded,
/// [`PipelineError::MalformedMask`] if the mask URL is unusable, and
/// [`PipelineError::TooLarge`] if any input exceeds `config.max_pixels`.
pub fn compose_staged(
    original: &[u8],
    pattern: &[u8],
    mask_data_url: &str,
    config: &CompositeConfig,
) -> Result<StagedResult, PipelineError> {
    let decoded = decode_inputs(original, pattern, mask_data_url, config)?;
    let mut staged = compose_images(decoded.original, decoded.pattern, decoded.mask, config)?;
    staged.diagnostics.decode = Some(decoded.diagnostics);
    staged.diagnostics.update_total();
    Ok(staged)
}

/// Run the pixel pipeline on already-decoded images.
///
/// `original` defines the output dimensions; `pattern` and `mask` are
/// stretched to match.
///
/// # Pipeline steps
///
/// 1. Align pattern and mask to the original's dimensions
/// 2. Optional mask threshold and feather
/// 3. Shading map: masked original over white, reduced to luma
/// 4. Shading transfer: pattern multiplied by the shading map
/// 5. Masked composite of the shaded pattern over the original
/// 6. Blend of the composite back toward the original by `blend_alpha`
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] for a rejected config and
/// [`PipelineError::TooLarge`] if the original exceeds `config.max_pixels`.
pub fn compose_images(
    original: RgbImage,
    pattern: RgbImage,
    mask: GrayImage,
    config: &CompositeConfig,
) -> Result<StagedResult, PipelineError> {
    let stages = run_stages::<KeepAll>(original, pattern, mask, config)?;
    Ok(StagedResult {
        original: stages.original,
        pattern: stages.pattern,
        mask: stages.mask,
        shading: stages.shading,
        pattern_shaded: stages.pattern_shaded,
        composited: stages.composited,
        result: stages.result,
        dimensions: stages.dimensions,
        diagnostics: stages.diagnostics,
    })
}

struct Decoded {
    original: RgbImage,
    pattern: RgbImage,
    mask: GrayImage,
    diagnostics: StageDiagnostics,
}

fn decode_inputs(
    original: &[u8],
    pattern: &[u8],
    mask_data_url: &str,
    config: &CompositeConfig,
) -> Result<Decoded, PipelineError> {
    config.validate()?;
    if original.is_empty() {
        return Err(PipelineError::MissingInput(InputKind::Original));
    }
    if pattern.is_empty() {
        return Err(PipelineError::MissingInput(InputKind::Pattern));
    }
    if mask_data_url.trim().is_empty() {
        return Err(PipelineError::MissingInput(InputKind::Mask));
    }

    let clock = Clock::start();
    let original_img = decode::decode_rgb(original, InputKind::Original, config.max_pixels)?;
    let pattern_img = decode::decode_rgb(pattern, InputKind::Pattern, config.max_pixels)?;
    let mask_img = data_url::decode_mask_data_url(mask_data_url, config.max_pixels)?;
    let diagnostics = clock.finish(StageMetrics::Decode {
        original_bytes: original.len(),
        pattern_bytes: pattern.len(),
        mask_chars: mask_data_url.len(),
        pattern_dimensions: pattern_img.dimensions().into(),
        mask_dimensions: mask_img.dimensions().into(),
    });

    Ok(Decoded {
        original: original_img,
        pattern: pattern_img,
        mask: mask_img,
        diagnostics,
    })
}

/// What happens to an intermediate buffer after its last use.
trait Retention {
    type Slot<T>;

    fn hold<T>(value: T) -> Self::Slot<T>;
}

/// Keep every intermediate for inspection.
struct KeepAll;

impl Retention for KeepAll {
    type Slot<T> = T;

    fn hold<T>(value: T) -> T {
        value
    }
}

/// Free each intermediate as soon as no later stage reads it.
struct DropEach;

impl Retention for DropEach {
    type Slot<T> = ();

    fn hold<T>(value: T) {
        drop(value);
    }
}

struct Stages<R: Retention> {
    original: R::Slot<RgbImage>,
    pattern: R::Slot<RgbImage>,
    mask: R::Slot<GrayImage>,
    shading: R::Slot<GrayImage>,
    pattern_shaded: R::Slot<RgbImage>,
    composited: R::Slot<RgbImage>,
    result: RgbImage,
    dimensions: Dimensions,
    diagnostics: CompositeDiagnostics,
}

fn run_stages<R: Retention>(
    original: RgbImage,
    pattern: RgbImage,
    mask: GrayImage,
    config: &CompositeConfig,
) -> Result<Stages<R>, PipelineError> {
    config.validate()?;
    let dimensions = Dimensions::from(original.dimensions());
    if dimensions.pixel_count() > config.max_pixels {
        return Err(PipelineError::TooLarge {
            input: InputKind::Original,
            width: dimensions.width,
            height: dimensions.height,
            max_pixels: config.max_pixels,
        });
    }

    // 1. Align.
    let clock = Clock::start();
    let (pattern, pattern_resized) = align::align(pattern, dimensions, config.resize_filter);
    let (mask, mask_resized) = align::align(mask, dimensions, config.resize_filter);
    let align_diag = clock.finish(StageMetrics::Align {
        filter: config.resize_filter.to_string(),
        pattern_resized,
        mask_resized,
    });

    // 2. Optional refinement.
    let (mask, refine_diag) = if config.mask_threshold.is_some() || config.mask_feather_sigma > 0.0
    {
        let clock = Clock::start();
        let refined =
            mask::refine_mask(&mask, config.mask_threshold, config.mask_feather_sigma);
        let diag = clock.finish(StageMetrics::RefineMask {
            threshold: config.mask_threshold,
            feather_sigma: config.mask_feather_sigma,
        });
        (refined, Some(diag))
    } else {
        (mask, None)
    };

    // 3. Shading map.
    let clock = Clock::start();
    let shading = shading::extract_shading(&original, &mask);
    let shading_diag = clock.finish(StageMetrics::Shading {
        mean_masked_shading: shading::mean_masked_shading(&shading, &mask),
    });

    // 4. Shading transfer.
    let clock = Clock::start();
    let pattern_shaded = shading::transfer_shading(&pattern, &shading);
    let pattern = R::hold(pattern);
    let shading = R::hold(shading);
    let transfer_diag = clock.finish(StageMetrics::Transfer);

    // 5. Masked composite.
    let clock = Clock::start();
    let composited = composite::masked_composite(&pattern_shaded, &original, &mask);
    let coverage = mask::coverage(&mask);
    let pattern_shaded = R::hold(pattern_shaded);
    let mask = R::hold(mask);
    let composite_diag = clock.finish(StageMetrics::Composite { coverage });

    // 6. Blend.
    let clock = Clock::start();
    let result = composite::blend(&original, &composited, config.blend_alpha);
    let original = R::hold(original);
    let composited = R::hold(composited);
    let blend_diag = clock.finish(StageMetrics::Blend {
        alpha: config.blend_alpha,
    });

    let mut diagnostics = CompositeDiagnostics {
        decode: None,
        align: align_diag,
        refine_mask: refine_diag,
        extract_shading: shading_diag,
        transfer_shading: transfer_diag,
        composite: composite_diag,
        blend: blend_diag,
        encode: None,
        total_duration: std::time::Duration::ZERO,
        summary: CompositeSummary {
            width: dimensions.width,
            height: dimensions.height,
            pixel_count: dimensions.pixel_count(),
            coverage,
        },
    };
    diagnostics.update_total();

    Ok(Stages {
        original,
        pattern,
        mask,
        shading,
        pattern_shaded,
        composited,
        result,
        dimensions,
        diagnostics,
    })
}
