//! Run diagnostics: durations, pass counters, and segment statistics.
//!
//! These are permanent instrumentation for parameter tuning rather than
//! debug scaffolding. Every [`run_diagnosed`](crate::Segmenter::run_diagnosed)
//! call collects them alongside the segmentation; `musubi-bench`
//! serializes them with `--json`.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::Segmentation;

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

/// Diagnostics collected from a single segmentation run.
///
/// Phases that are conditionally skipped (absorption when `min_merge`
/// is zero, aggregation when kill mode is off) have `Option` fields
/// that are `None` when the phase was not executed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentationDiagnostics {
    /// Merge phase: the initial pass plus every averaging round.
    pub merge: MergeDiagnostics,
    /// Small-segment absorption, when a minimum size was configured.
    pub absorb: Option<AbsorbDiagnostics>,
    /// Sink aggregation, when the kill threshold was active.
    pub aggregate: Option<AggregateDiagnostics>,
    /// Finalization (dense renumbering) duration.
    #[serde(with = "duration_serde")]
    pub finalize_duration: Duration,
    /// Total wall-clock duration of the run.
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Statistics over the final segmentation.
    pub summary: SegmentSummary,
}

/// Metrics for the merge phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeDiagnostics {
    /// Wall-clock duration of all merge passes and averaging steps.
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Pass-to-convergence invocations (1 + averaging rounds).
    pub rounds: u32,
    /// Full sweeps across all rounds, including zero-union ones.
    pub sweeps: u32,
    /// Unions accepted across all rounds.
    pub unions: u64,
    /// Whether the boundary-weighted variant ran.
    pub weighted: bool,
}

/// Metrics for the small-segment absorption phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbsorbDiagnostics {
    /// Wall-clock duration of the absorption loop.
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Sweeps performed, including the final zero-union one.
    pub passes: u32,
    /// Undersized segments absorbed.
    pub unions: u64,
}

/// Metrics for the sink-aggregation phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateDiagnostics {
    /// Segments gathered into the sink.
    pub gathered: u32,
    /// Pixels carried by the sink after aggregation.
    pub sink_pixels: u64,
}

/// Statistics over a finished segmentation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentSummary {
    /// Number of segments, including a reserved sink.
    pub segments: u32,
    /// Smallest segment size in pixels (0 when a reserved sink is empty).
    pub min_size: u64,
    /// Largest segment size in pixels.
    pub max_size: u64,
    /// Mean segment size in pixels.
    pub mean_size: f64,
}

impl SegmentationDiagnostics {
    /// Render a human-readable report, one phase per line.
    #[must_use]
    pub fn report(&self) -> String {
        use std::fmt::Write as _;

        let mut out = String::new();
        let _ = writeln!(
            out,
            "segments:  {} (min {} px, max {} px, mean {:.1} px)",
            self.summary.segments, self.summary.min_size, self.summary.max_size,
            self.summary.mean_size,
        );
        let variant = if self.merge.weighted {
            "weighted"
        } else {
            "basic"
        };
        let _ = writeln!(
            out,
            "merge:     {:.4} s, {variant}, {} round(s), {} sweeps, {} unions",
            self.merge.duration.as_secs_f64(),
            self.merge.rounds,
            self.merge.sweeps,
            self.merge.unions,
        );
        if let Some(absorb) = &self.absorb {
            let _ = writeln!(
                out,
                "absorb:    {:.4} s, {} pass(es), {} absorbed",
                absorb.duration.as_secs_f64(),
                absorb.passes,
                absorb.unions,
            );
        }
        if let Some(aggregate) = &self.aggregate {
            let _ = writeln!(
                out,
                "aggregate: {} segment(s) into sink ({} px)",
                aggregate.gathered, aggregate.sink_pixels,
            );
        }
        let _ = writeln!(
            out,
            "finalize:  {:.4} s",
            self.finalize_duration.as_secs_f64(),
        );
        let _ = write!(out, "total:     {:.4} s", self.total_duration.as_secs_f64());
        out
    }
}

impl SegmentSummary {
    /// Compute size statistics from a segmentation.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_segmentation(segmentation: &Segmentation) -> Self {
        let sizes = segmentation.segment_sizes();
        let total: u64 = sizes.iter().sum();
        let count = sizes.len();
        Self {
            segments: segmentation.segments(),
            min_size: sizes.iter().copied().min().unwrap_or(0),
            max_size: sizes.iter().copied().max().unwrap_or(0),
            mean_size: if count == 0 {
                0.0
            } else {
                total as f64 / count as f64
            },
        }
    }
}
