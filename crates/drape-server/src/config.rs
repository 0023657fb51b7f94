//! Process-wide server configuration.
//!
//! Parsed once at startup from the command line (and environment), then
//! shared read-only with every request through the router state.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use drape_pipeline::{CompositeConfig, ResizeFilter};

/// One mebibyte.
pub const MIB: usize = 1024 * 1024;

/// Default request body ceiling in mebibytes.
pub const DEFAULT_MAX_BODY_MB: usize = 20;

/// Default number of composites allowed to run at the same time.
pub const DEFAULT_MAX_CONCURRENT: usize = 4;

/// Default listening address.
pub const DEFAULT_BIND: &str = "127.0.0.1:3000";

/// Resolved server configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Address the listener binds to.
    pub bind: SocketAddr,
    /// Largest accepted request body in bytes.
    pub max_body_bytes: usize,
    /// Composites allowed in flight at once; further requests wait.
    pub max_concurrent: usize,
    /// Compositor settings applied to every request.
    pub composite: CompositeConfig,
    /// Landing page served at `GET /`; the built-in page when `None`.
    pub index_path: Option<PathBuf>,
}

impl ServerConfig {
    /// Body ceiling in whole mebibytes, as shown to clients.
    #[must_use]
    pub const fn max_body_mb(&self) -> usize {
        self.max_body_bytes / MIB
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 3000)),
            max_body_bytes: DEFAULT_MAX_BODY_MB * MIB,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            composite: CompositeConfig::default(),
            index_path: None,
        }
    }
}

/// Serve the drape compositor over HTTP.
///
/// `POST /generate` accepts a multipart form with `original` and
/// `pattern` image files and a `mask` data URL, and responds with the
/// composited PNG.
#[derive(Debug, Parser)]
#[command(name = "drape-server", version)]
pub struct Cli {
    /// Address to listen on.
    #[arg(long, env = "DRAPE_BIND", default_value = DEFAULT_BIND)]
    pub bind: SocketAddr,

    /// Maximum request body size in MiB.
    #[arg(long, env = "DRAPE_MAX_BODY_MB", default_value_t = DEFAULT_MAX_BODY_MB,
          value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    pub max_body_mb: usize,

    /// Composites allowed to run at once; excess requests queue.
    #[arg(long, env = "DRAPE_MAX_CONCURRENT", default_value_t = DEFAULT_MAX_CONCURRENT,
          value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    pub max_concurrent: usize,

    /// Maximum pixel count (width * height) accepted for any input image.
    #[arg(long, default_value_t = CompositeConfig::DEFAULT_MAX_PIXELS,
          value_parser = clap::builder::RangedU64ValueParser::<u64>::new().range(1..))]
    pub max_pixels: u64,

    /// Weight of the composite in the final blend with the original (0.0-1.0).
    #[arg(long, default_value_t = CompositeConfig::DEFAULT_BLEND_ALPHA)]
    pub blend_alpha: f32,

    /// Binarize the mask at this level before compositing.
    #[arg(long)]
    pub mask_threshold: Option<u8>,

    /// Gaussian sigma used to feather the mask edge (0 disables).
    #[arg(long, default_value_t = CompositeConfig::DEFAULT_MASK_FEATHER_SIGMA)]
    pub mask_feather: f32,

    /// Resampling filter for stretching pattern and mask.
    #[arg(long, value_enum, default_value_t = Filter::Triangle)]
    pub resize_filter: Filter,

    /// Serve this HTML file at `GET /` instead of the built-in page.
    #[arg(long)]
    pub index: Option<PathBuf>,
}

/// Resampling filter selection.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum Filter {
    /// Nearest-neighbor (fastest, blocky).
    Nearest,
    /// Bilinear interpolation.
    Triangle,
    /// Bicubic Catmull-Rom.
    CatmullRom,
    /// Gaussian (smooth).
    Gaussian,
    /// Lanczos with 3 lobes (sharpest).
    Lanczos3,
}

impl From<Filter> for ResizeFilter {
    fn from(filter: Filter) -> Self {
        match filter {
            Filter::Nearest => Self::Nearest,
            Filter::Triangle => Self::Triangle,
            Filter::CatmullRom => Self::CatmullRom,
            Filter::Gaussian => Self::Gaussian,
            Filter::Lanczos3 => Self::Lanczos3,
        }
    }
}

impl Cli {
    /// Build a [`ServerConfig`] from the parsed arguments.
    #[must_use]
    pub fn into_config(self) -> ServerConfig {
        ServerConfig {
            bind: self.bind,
            max_body_bytes: self.max_body_mb.saturating_mul(MIB),
            max_concurrent: self.max_concurrent,
            composite: CompositeConfig {
                blend_alpha: self.blend_alpha,
                resize_filter: self.resize_filter.into(),
                mask_threshold: self.mask_threshold,
                mask_feather_sigma: self.mask_feather,
                max_pixels: self.max_pixels,
            },
            index_path: self.index,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_server_config_default() {
        let cli = Cli::try_parse_from(["drape-server"]).unwrap();
        assert_eq!(cli.into_config(), ServerConfig::default());
    }

    #[test]
    fn default_body_limit_is_twenty_mib() {
        let config = ServerConfig::default();
        assert_eq!(config.max_body_bytes, 20 * 1024 * 1024);
        assert_eq!(config.max_body_mb(), 20);
    }

    #[test]
    fn flags_flow_into_composite_config() {
        let cli = Cli::try_parse_from([
            "drape-server",
            "--bind",
            "0.0.0.0:8080",
            "--max-body-mb",
            "5",
            "--max-concurrent",
            "2",
            "--blend-alpha",
            "0.5",
            "--mask-threshold",
            "128",
            "--mask-feather",
            "1.5",
            "--resize-filter",
            "lanczos3",
        ])
        .unwrap();
        let config = cli.into_config();
        assert_eq!(config.bind.port(), 8080);
        assert_eq!(config.max_body_bytes, 5 * MIB);
        assert_eq!(config.max_concurrent, 2);
        assert!((config.composite.blend_alpha - 0.5).abs() < f32::EPSILON);
        assert_eq!(config.composite.mask_threshold, Some(128));
        assert_eq!(config.composite.resize_filter, ResizeFilter::Lanczos3);
    }

    #[test]
    fn zero_body_limit_is_rejected() {
        assert!(Cli::try_parse_from(["drape-server", "--max-body-mb", "0"]).is_err());
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        assert!(Cli::try_parse_from(["drape-server", "--max-concurrent", "0"]).is_err());
    }
}
