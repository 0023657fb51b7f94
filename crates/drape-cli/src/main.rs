//! drape: run the shading-preserving compositor on local files.
//!
//! Takes an original photo, a pattern, and a mask, and writes the
//! composited PNG. The mask is either an image file (white = replace) or,
//! with `--mask-data-url`, a text file holding a `data:` URL exactly as a
//! browser client would send it. Useful for:
//!
//! - Producing mockups without running the server
//! - Tuning blend alpha, mask threshold, and feathering
//! - Inspecting intermediate stages (`--dump-stages`)
//! - Measuring per-stage durations
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin drape -- [OPTIONS] <ORIGINAL> <PATTERN> <MASK>
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use drape_pipeline::{CompositeConfig, InputKind, PipelineError, ResizeFilter, StagedResult};

/// Drape a pattern over the masked region of a photo, keeping its shading.
#[derive(Parser)]
#[command(name = "drape", version)]
struct Cli {
    /// Path to the original photo (PNG, JPEG, BMP, WebP).
    original: PathBuf,

    /// Path to the pattern image.
    pattern: PathBuf,

    /// Path to the mask image, or a data URL text file with `--mask-data-url`.
    mask: PathBuf,

    /// Where to write the resulting PNG.
    #[arg(short, long, default_value = "drape.png")]
    output: PathBuf,

    /// Treat the mask file as a `data:<mime>;base64,<payload>` URL.
    #[arg(long)]
    mask_data_url: bool,

    /// Weight of the composite in the final blend with the original (0.0-1.0).
    #[arg(long, default_value_t = CompositeConfig::DEFAULT_BLEND_ALPHA)]
    blend_alpha: f32,

    /// Binarize the mask at this level before compositing.
    #[arg(long)]
    mask_threshold: Option<u8>,

    /// Gaussian sigma used to feather the mask edge (0 disables).
    #[arg(long, default_value_t = CompositeConfig::DEFAULT_MASK_FEATHER_SIGMA)]
    mask_feather: f32,

    /// Resampling filter (nearest, triangle, catmull-rom, gaussian, lanczos3).
    #[arg(long, value_enum, default_value_t = CLI_DEFAULT_FILTER)]
    resize_filter: Filter,

    /// Maximum pixel count (width * height) accepted for any input image.
    #[arg(long, default_value_t = CompositeConfig::DEFAULT_MAX_PIXELS,
          value_parser = clap::builder::RangedU64ValueParser::<u64>::new().range(1..))]
    max_pixels: u64,

    /// Full compositor config as a JSON string.
    ///
    /// When provided, all other compositor flags are ignored. The JSON
    /// must be a valid `CompositeConfig` serialization; missing fields
    /// take their defaults.
    #[arg(long)]
    config_json: Option<String>,

    /// Print the per-stage diagnostics report to stdout.
    #[arg(long)]
    report: bool,

    /// Print diagnostics as JSON instead of the human-readable report.
    #[arg(long)]
    json: bool,

    /// Write every intermediate stage as a PNG into this directory.
    #[arg(long)]
    dump_stages: Option<PathBuf>,
}

/// Resampling filter selection.
#[derive(Clone, Copy, ValueEnum)]
enum Filter {
    /// Nearest-neighbor (fastest, blocky).
    Nearest,
    /// Bilinear interpolation (fast, decent quality).
    Triangle,
    /// Bicubic Catmull-Rom (moderate, good quality).
    CatmullRom,
    /// Gaussian (moderate, smooth).
    Gaussian,
    /// Lanczos with 3 lobes (slowest, sharpest).
    Lanczos3,
}

const fn filter_from_pipeline(f: ResizeFilter) -> Filter {
    match f {
        ResizeFilter::Nearest => Filter::Nearest,
        ResizeFilter::Triangle => Filter::Triangle,
        ResizeFilter::CatmullRom => Filter::CatmullRom,
        ResizeFilter::Gaussian => Filter::Gaussian,
        ResizeFilter::Lanczos3 => Filter::Lanczos3,
    }
}

/// The CLI default filter, derived from
/// [`CompositeConfig::DEFAULT_RESIZE_FILTER`] so the two cannot drift.
const CLI_DEFAULT_FILTER: Filter = filter_from_pipeline(CompositeConfig::DEFAULT_RESIZE_FILTER);

/// Build a [`CompositeConfig`] from CLI arguments.
///
/// `--config-json` wins over the individual flags.
fn config_from_cli(cli: &Cli) -> Result<CompositeConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(CompositeConfig {
        blend_alpha: cli.blend_alpha,
        resize_filter: match cli.resize_filter {
            Filter::Nearest => ResizeFilter::Nearest,
            Filter::Triangle => ResizeFilter::Triangle,
            Filter::CatmullRom => ResizeFilter::CatmullRom,
            Filter::Gaussian => ResizeFilter::Gaussian,
            Filter::Lanczos3 => ResizeFilter::Lanczos3,
        },
        mask_threshold: cli.mask_threshold,
        mask_feather_sigma: cli.mask_feather,
        max_pixels: cli.max_pixels,
    })
}

fn read(path: &Path) -> Result<Vec<u8>, String> {
    std::fs::read(path).map_err(|e| format!("Error reading {}: {e}", path.display()))
}

/// Decode the inputs and run the pipeline.
///
/// A data-URL mask goes through the same parser the server uses; an
/// image mask is decoded directly.
fn run_pipeline(
    cli: &Cli,
    config: &CompositeConfig,
    original: &[u8],
    pattern: &[u8],
    mask: &[u8],
) -> Result<StagedResult, PipelineError> {
    if cli.mask_data_url {
        let text = String::from_utf8_lossy(mask);
        return drape_pipeline::compose_staged(original, pattern, &text, config);
    }

    config.validate()?;
    let limit = config.max_pixels;
    let original = drape_pipeline::decode::decode_rgb(original, InputKind::Original, limit)?;
    let pattern = drape_pipeline::decode::decode_rgb(pattern, InputKind::Pattern, limit)?;
    let mask = drape_pipeline::decode::decode_mask_bytes(mask, limit)?;
    drape_pipeline::compose_images(original, pattern, mask, config)
}

/// Write each intermediate of `staged` into `dir` as numbered PNGs.
fn dump_stages(staged: &StagedResult, dir: &Path) -> Result<(), String> {
    use drape_pipeline::encode::{encode_png, encode_png_gray};

    std::fs::create_dir_all(dir).map_err(|e| format!("Error creating {}: {e}", dir.display()))?;

    let stages = [
        ("1-original", encode_png(&staged.original)),
        ("2-pattern", encode_png(&staged.pattern)),
        ("3-mask", encode_png_gray(&staged.mask)),
        ("4-shading", encode_png_gray(&staged.shading)),
        ("5-pattern-shaded", encode_png(&staged.pattern_shaded)),
        ("6-composited", encode_png(&staged.composited)),
        ("7-result", encode_png(&staged.result)),
    ];
    for (name, png) in stages {
        let png = png.map_err(|e| format!("Error encoding {name}: {e}"))?;
        let path = dir.join(format!("{name}.png"));
        std::fs::write(&path, &png)
            .map_err(|e| format!("Error writing {}: {e}", path.display()))?;
        eprintln!("  {} ({} bytes)", path.display(), png.len());
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("{msg}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), String> {
    let config = config_from_cli(cli)?;
    let original = read(&cli.original)?;
    let pattern = read(&cli.pattern)?;
    let mask = read(&cli.mask)?;

    eprintln!(
        "Original: {} ({} bytes)",
        cli.original.display(),
        original.len()
    );
    eprintln!(
        "Pattern: {} ({} bytes)",
        cli.pattern.display(),
        pattern.len()
    );
    eprintln!("Mask: {} ({} bytes)", cli.mask.display(), mask.len());
    eprintln!("Config: {config:#?}");
    eprintln!();

    let staged = run_pipeline(cli, &config, &original, &pattern, &mask)
        .map_err(|e| format!("Pipeline error: {e}"))?;

    let clock = drape_pipeline::diagnostics::Clock::start();
    let png = drape_pipeline::encode::encode_png(&staged.result)
        .map_err(|e| format!("Pipeline error: {e}"))?;
    let mut diagnostics = staged.diagnostics.clone();
    diagnostics.encode = Some(clock.finish(drape_pipeline::diagnostics::StageMetrics::Encode {
        output_bytes: png.len(),
    }));
    diagnostics.update_total();

    std::fs::write(&cli.output, &png)
        .map_err(|e| format!("Error writing {}: {e}", cli.output.display()))?;
    eprintln!(
        "Result written to {} ({}, {} bytes)",
        cli.output.display(),
        staged.dimensions,
        png.len(),
    );

    if let Some(ref dir) = cli.dump_stages {
        eprintln!("Stages:");
        dump_stages(&staged, dir)?;
    }

    if cli.json {
        let json = serde_json::to_string_pretty(&diagnostics)
            .map_err(|e| format!("Error serializing diagnostics: {e}"))?;
        println!("{json}");
    } else if cli.report {
        println!("{}", diagnostics.report());
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["drape", "photo.jpg", "pattern.png", "mask.png"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults_match_pipeline_defaults() {
        let cli = parse(&[]);
        assert_eq!(config_from_cli(&cli).unwrap(), CompositeConfig::default());
        assert_eq!(cli.output, PathBuf::from("drape.png"));
    }

    #[test]
    fn flags_override_defaults() {
        let cli = parse(&[
            "--blend-alpha",
            "1.0",
            "--mask-threshold",
            "100",
            "--resize-filter",
            "nearest",
        ]);
        let config = config_from_cli(&cli).unwrap();
        assert!((config.blend_alpha - 1.0).abs() < f32::EPSILON);
        assert_eq!(config.mask_threshold, Some(100));
        assert_eq!(config.resize_filter, ResizeFilter::Nearest);
    }

    #[test]
    fn config_json_wins_over_flags() {
        let cli = parse(&["--blend-alpha", "0.1", "--config-json", r#"{"blend_alpha": 0.5}"#]);
        let config = config_from_cli(&cli).unwrap();
        assert!((config.blend_alpha - 0.5).abs() < f32::EPSILON);
        assert_eq!(config.max_pixels, CompositeConfig::DEFAULT_MAX_PIXELS);
    }

    #[test]
    fn bad_config_json_is_reported() {
        let cli = parse(&["--config-json", "{not json"]);
        let err = config_from_cli(&cli).unwrap_err();
        assert!(err.starts_with("Error parsing --config-json"));
    }
}
