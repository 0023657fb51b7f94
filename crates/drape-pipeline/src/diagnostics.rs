//! Compositing diagnostics: timing and metrics for each stage.
//!
//! Every call to [`compose_staged`](crate::compose_staged) collects
//! diagnostics alongside the intermediate images. Timestamps are captured
//! via the `web-time` crate so the pipeline stays usable on WASM.
//!
//! Durations are serialized as fractional seconds (`f64`) since
//! `std::time::Duration` does not implement serde traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::Dimensions;

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Wall-clock stopwatch for a single stage.
#[derive(Debug, Clone, Copy)]
pub struct Clock(web_time::Instant);

impl Clock {
    /// Start timing.
    #[must_use]
    pub fn start() -> Self {
        Self(web_time::Instant::now())
    }

    /// Time elapsed since [`start`](Self::start).
    #[must_use]
    pub fn elapsed(self) -> Duration {
        self.0.elapsed()
    }

    /// Finish timing and attach metrics.
    #[must_use]
    pub fn finish(self, metrics: StageMetrics) -> StageDiagnostics {
        StageDiagnostics {
            duration: self.elapsed(),
            metrics,
        }
    }
}

/// Diagnostics collected from a single compositing run.
///
/// `decode` is only present when the run started from encoded bytes and
/// `encode` only when the result was serialized to PNG.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeDiagnostics {
    /// Decoding of original, pattern, and mask.
    pub decode: Option<StageDiagnostics>,
    /// Stretching pattern and mask onto the original.
    pub align: StageDiagnostics,
    /// Threshold and feather (only when configured).
    pub refine_mask: Option<StageDiagnostics>,
    /// Shading map extraction.
    pub extract_shading: StageDiagnostics,
    /// Multiplying the pattern by the shading map.
    pub transfer_shading: StageDiagnostics,
    /// Masked composite over the original.
    pub composite: StageDiagnostics,
    /// Final blend toward the original.
    pub blend: StageDiagnostics,
    /// PNG serialization.
    pub encode: Option<StageDiagnostics>,
    /// Total wall-clock duration of all recorded stages (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary values across all stages.
    pub summary: CompositeSummary,
}

/// Diagnostics for a single stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Input decoding.
    Decode {
        /// Encoded size of the original image.
        original_bytes: usize,
        /// Encoded size of the pattern image.
        pattern_bytes: usize,
        /// Length of the mask data URL text.
        mask_chars: usize,
        /// Decoded pattern size before alignment.
        pattern_dimensions: Dimensions,
        /// Decoded mask size before alignment.
        mask_dimensions: Dimensions,
    },
    /// Dimension alignment.
    Align {
        /// Filter used for resampling.
        filter: String,
        /// Whether the pattern had to be resampled.
        pattern_resized: bool,
        /// Whether the mask had to be resampled.
        mask_resized: bool,
    },
    /// Mask threshold and feather.
    RefineMask {
        /// Threshold level, if any.
        threshold: Option<u8>,
        /// Feather sigma.
        feather_sigma: f32,
    },
    /// Shading map extraction.
    Shading {
        /// Mask-weighted mean of the shading map, `None` for an empty mask.
        mean_masked_shading: Option<f64>,
    },
    /// Shading transfer onto the pattern.
    Transfer,
    /// Masked composite.
    Composite {
        /// Mean mask weight in `[0, 1]`.
        coverage: f64,
    },
    /// Final blend.
    Blend {
        /// Weight of the composite.
        alpha: f32,
    },
    /// PNG encoding.
    Encode {
        /// Size of the encoded output.
        output_bytes: usize,
    },
}

/// High-level summary for the whole run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeSummary {
    /// Output width in pixels (the original's).
    pub width: u32,
    /// Output height in pixels (the original's).
    pub height: u32,
    /// Total pixel count.
    pub pixel_count: u64,
    /// Mean mask weight in `[0, 1]`.
    pub coverage: f64,
}

impl CompositeDiagnostics {
    /// Recompute `total_duration` from the recorded stages.
    pub fn update_total(&mut self) {
        self.total_duration = self.stages().iter().map(|(_, d)| d.duration).sum();
    }

    /// All recorded stages in execution order with display names.
    #[must_use]
    pub fn stages(&self) -> Vec<(&'static str, &StageDiagnostics)> {
        let mut stages = Vec::with_capacity(8);
        if let Some(ref d) = self.decode {
            stages.push(("Decode", d));
        }
        stages.push(("Align", &self.align));
        if let Some(ref r) = self.refine_mask {
            stages.push(("Refine Mask", r));
        }
        stages.push(("Extract Shading", &self.extract_shading));
        stages.push(("Transfer Shading", &self.transfer_shading));
        stages.push(("Composite", &self.composite));
        stages.push(("Blend", &self.blend));
        if let Some(ref e) = self.encode {
            stages.push(("Encode", e));
        }
        stages
    }

    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Composite Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels), mask coverage {:.1}%",
            self.summary.width,
            self.summary.height,
            self.summary.pixel_count,
            self.summary.coverage * 100.0,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        for (name, diag) in self.stages() {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Decode {
            original_bytes,
            pattern_bytes,
            mask_chars,
            pattern_dimensions,
            mask_dimensions,
        } => format!(
            "original={original_bytes}B pattern={pattern_bytes}B ({pattern_dimensions}) mask={mask_chars} chars ({mask_dimensions})",
        ),
        StageMetrics::Align {
            filter,
            pattern_resized,
            mask_resized,
        } => format!("filter={filter} pattern_resized={pattern_resized} mask_resized={mask_resized}"),
        StageMetrics::RefineMask {
            threshold,
            feather_sigma,
        } => match threshold {
            Some(t) => format!("threshold={t} feather={feather_sigma:.2}"),
            None => format!("threshold=off feather={feather_sigma:.2}"),
        },
        StageMetrics::Shading {
            mean_masked_shading,
        } => match mean_masked_shading {
            Some(mean) => format!("mean masked shading={mean:.1}"),
            None => "empty mask".to_owned(),
        },
        StageMetrics::Transfer => String::new(),
        StageMetrics::Composite { coverage } => format!("coverage={:.1}%", coverage * 100.0),
        StageMetrics::Blend { alpha } => format!("alpha={alpha:.2}"),
        StageMetrics::Encode { output_bytes } => format!("{output_bytes} bytes"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn stage(ms: u64, metrics: StageMetrics) -> StageDiagnostics {
        StageDiagnostics {
            duration: Duration::from_millis(ms),
            metrics,
        }
    }

    fn sample() -> CompositeDiagnostics {
        CompositeDiagnostics {
            decode: None,
            align: stage(
                2,
                StageMetrics::Align {
                    filter: "Triangle".to_owned(),
                    pattern_resized: true,
                    mask_resized: false,
                },
            ),
            refine_mask: None,
            extract_shading: stage(3, StageMetrics::Shading {
                mean_masked_shading: Some(128.0),
            }),
            transfer_shading: stage(1, StageMetrics::Transfer),
            composite: stage(1, StageMetrics::Composite { coverage: 0.25 }),
            blend: stage(1, StageMetrics::Blend { alpha: 0.8 }),
            encode: Some(stage(2, StageMetrics::Encode { output_bytes: 1234 })),
            total_duration: Duration::ZERO,
            summary: CompositeSummary {
                width: 10,
                height: 20,
                pixel_count: 200,
                coverage: 0.25,
            },
        }
    }

    #[test]
    fn total_sums_recorded_stages() {
        let mut diag = sample();
        diag.update_total();
        assert_eq!(diag.total_duration, Duration::from_millis(10));
    }

    #[test]
    fn optional_stages_are_skipped() {
        let names: Vec<_> = sample().stages().into_iter().map(|(n, _)| n).collect();
        assert_eq!(
            names,
            [
                "Align",
                "Extract Shading",
                "Transfer Shading",
                "Composite",
                "Blend",
                "Encode"
            ],
        );
    }

    #[test]
    fn report_mentions_every_stage() {
        let mut diag = sample();
        diag.update_total();
        let report = diag.report();
        for (name, _) in diag.stages() {
            assert!(report.contains(name), "missing {name} in report");
        }
        assert!(report.contains("10x20"));
        assert!(report.contains("1234 bytes"));
    }

    #[test]
    fn serde_round_trip_preserves_durations() {
        let mut diag = sample();
        diag.update_total();
        let json = serde_json::to_string(&diag).unwrap();
        let back: CompositeDiagnostics = serde_json::from_str(&json).unwrap();
        let drift = back.total_duration.abs_diff(diag.total_duration);
        assert!(drift < Duration::from_micros(1), "drift {drift:?}");
        assert_eq!(back.summary.pixel_count, 200);
    }

    #[test]
    fn negative_duration_is_rejected() {
        let json = r#"{"duration": -1.0, "metrics": "Transfer"}"#;
        let result: Result<StageDiagnostics, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }
}
