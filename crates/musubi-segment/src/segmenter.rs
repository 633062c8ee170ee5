//! The segmentation engine: configure, run once, read the result.
//!
//! [`Segmenter`] is the configuring state of the engine. Feature
//! channels, the optional boundary-weight channel, and scalar
//! parameters are added while it is owned mutably; [`run`](Segmenter::run)
//! then **consumes** the segmenter and returns a read-only
//! [`Segmentation`]. Running twice or configuring after a run is a
//! compile error rather than a runtime assertion — the
//! configuring→running→finalized state machine is enforced by
//! ownership, the same way pipeline stages consume each other in a
//! staged pipeline.
//!
//! The run executes, in order: merge passes with the averaging
//! schedule, small-segment absorption, optional sink aggregation, and
//! dense renumbering into the output buffer.

use std::time::Instant;

use crate::diagnostics::{
    AbsorbDiagnostics, AggregateDiagnostics, MergeDiagnostics, SegmentSummary,
    SegmentationDiagnostics,
};
use crate::forest::Forest;
use crate::progress::{Progress, Silent};
use crate::types::{Dimensions, ScalarField, SegmentError, Segmentation};
use crate::{absorb, average, finalize, merge};

/// One configured feature channel: a scalar grid and the multiplicative
/// scale applied before any distance computation.
struct Feature {
    field: ScalarField,
    scale: f32,
}

/// The boundary-weight channel and its cutoff.
struct WeightChannel {
    field: ScalarField,
    cutoff: f32,
}

/// Phase results threaded from the merge/absorb/aggregate sequence into
/// finalization and diagnostics.
struct Phases {
    merge: MergeDiagnostics,
    absorb: Option<AbsorbDiagnostics>,
    aggregate: Option<AggregateDiagnostics>,
    sink: Option<usize>,
    reserve_sink: bool,
}

/// Feature-space segmentation engine in its configuring state.
///
/// Groups pixels of a fixed-size 2D grid into contiguous segments whose
/// members are close in a multi-channel feature space. Every pixel
/// starts as its own segment; segments within the cutoff distance of a
/// neighbor merge iteratively until no neighboring pair is close enough.
///
/// # Examples
///
/// ```
/// use musubi_segment::{Dimensions, ScalarField, Segmenter};
///
/// let dims = Dimensions { width: 4, height: 1 };
/// let channel =
///     ScalarField::from_raw(dims, vec![0.0, 0.0, 5.0, 5.0]).ok_or("bad buffer")?;
///
/// let mut segmenter = Segmenter::new();
/// segmenter.add_feature(channel, 1.0)?;
/// segmenter.set_cutoff(1.0);
///
/// let segmentation = segmenter.run()?;
/// assert_eq!(segmentation.segments(), 2);
/// assert_eq!(segmentation.labels(), &[0, 0, 1, 1]);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Segmenter {
    cutoff: f32,
    min_merge: u32,
    min_kill: u32,
    average_steps: u32,
    features: Vec<Feature>,
    weight: Option<WeightChannel>,
    dimensions: Option<Dimensions>,
}

impl Default for Segmenter {
    fn default() -> Self {
        Self::new()
    }
}

impl Segmenter {
    /// Create an engine with default parameters: cutoff 1.0, absorption
    /// and kill thresholds disabled, no averaging rounds.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cutoff: crate::SegmenterConfig::DEFAULT_CUTOFF,
            min_merge: crate::SegmenterConfig::DEFAULT_MIN_MERGE,
            min_kill: crate::SegmenterConfig::DEFAULT_MIN_KILL,
            average_steps: crate::SegmenterConfig::DEFAULT_AVERAGE_STEPS,
            features: Vec::new(),
            weight: None,
            dimensions: None,
        }
    }

    /// Create an engine from a scalar configuration.
    #[must_use]
    pub const fn with_config(config: &crate::SegmenterConfig) -> Self {
        Self {
            cutoff: config.cutoff,
            min_merge: config.min_merge,
            min_kill: config.min_kill,
            average_steps: config.average_steps,
            features: Vec::new(),
            weight: None,
            dimensions: None,
        }
    }

    /// Set the merge cutoff distance. Defaults to 1.0.
    pub fn set_cutoff(&mut self, cutoff: f32) {
        self.cutoff = cutoff;
    }

    /// Set the minimum segment size. Segments smaller than this are
    /// merged into their closest bordering segment regardless of the
    /// cutoff. Defaults to 0 (disabled).
    pub fn set_min_merge(&mut self, min: u32) {
        self.min_merge = min;
    }

    /// Set the kill threshold. Only takes effect when larger than the
    /// minimum segment size: every segment still smaller than this
    /// after absorption collapses into the reserved sink segment, id 0.
    /// The sink id then always exists, even when it gathers nothing.
    /// Defaults to 0 (disabled).
    pub fn set_min_kill(&mut self, min: u32) {
        self.min_kill = min;
    }

    /// Set the number of averaging rounds. Each round recomputes every
    /// segment's mean feature vector from the original per-pixel values
    /// and reruns the merge pass to convergence. Defaults to 0, which
    /// runs the merge pass once.
    pub fn set_average_steps(&mut self, steps: u32) {
        self.average_steps = steps;
    }

    /// Add a feature channel. Values are multiplied by `scale` before
    /// any distance computation. At least one channel is required.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::DimensionMismatch`] if the channel's
    /// dimensions differ from previously added channels.
    pub fn add_feature(&mut self, field: ScalarField, scale: f32) -> Result<(), SegmentError> {
        self.check_dimensions(field.dimensions())?;
        self.features.push(Feature { field, scale });
        Ok(())
    }

    /// Enable boundary-weighted merging: two segments within the
    /// feature cutoff still refuse to merge unless the mean of `field`
    /// over their touching pixels reaches `cutoff`. High weight values
    /// mark borders that may merge; low values mark edges to preserve.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::DimensionMismatch`] if the channel's
    /// dimensions differ from previously added channels.
    pub fn set_merge_weight(&mut self, field: ScalarField, cutoff: f32) -> Result<(), SegmentError> {
        self.check_dimensions(field.dimensions())?;
        self.weight = Some(WeightChannel { field, cutoff });
        Ok(())
    }

    /// Dimensions of the configured grid, once a channel has been added.
    #[must_use]
    pub const fn dimensions(&self) -> Option<Dimensions> {
        self.dimensions
    }

    fn check_dimensions(&mut self, dims: Dimensions) -> Result<(), SegmentError> {
        match self.dimensions {
            None => {
                self.dimensions = Some(dims);
                Ok(())
            }
            Some(expected) if expected == dims => Ok(()),
            Some(expected) => Err(SegmentError::DimensionMismatch {
                expected_width: expected.width,
                expected_height: expected.height,
                actual_width: dims.width,
                actual_height: dims.height,
            }),
        }
    }

    /// Run the segmentation, consuming the engine.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::NoFeatures`] if no feature channel was
    /// added.
    pub fn run(self) -> Result<Segmentation, SegmentError> {
        self.run_with_progress(&mut Silent)
    }

    /// Run the segmentation with a progress observer.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::NoFeatures`] if no feature channel was
    /// added, or [`SegmentError::Cancelled`] if the observer requests
    /// cancellation at a row boundary.
    pub fn run_with_progress(
        self,
        progress: &mut dyn Progress,
    ) -> Result<Segmentation, SegmentError> {
        self.run_diagnosed(progress).map(|(segmentation, _)| segmentation)
    }

    /// Run the segmentation and collect run diagnostics.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::NoFeatures`] if no feature channel was
    /// added, or [`SegmentError::Cancelled`] if the observer requests
    /// cancellation at a row boundary.
    pub fn run_diagnosed(
        self,
        progress: &mut dyn Progress,
    ) -> Result<(Segmentation, SegmentationDiagnostics), SegmentError> {
        let Some(dimensions) = self.dimensions else {
            return Err(SegmentError::NoFeatures);
        };
        if self.features.is_empty() {
            return Err(SegmentError::NoFeatures);
        }

        let total_start = Instant::now();
        let channels = self.features.len();
        let original = self.scaled_features(dimensions, channels);
        let mut forest = Forest::new(
            dimensions,
            channels,
            self.weight.is_some(),
            original.clone(),
        );

        progress.push();
        let phases = self.execute_phases(&mut forest, &original, &mut *progress);
        progress.pop();
        let phases = phases?;

        let finalize_start = Instant::now();
        let segmentation = finalize::finalize(
            &mut forest,
            phases.sink,
            phases.reserve_sink,
            &mut *progress,
        )?;
        let finalize_duration = finalize_start.elapsed();

        let diagnostics = SegmentationDiagnostics {
            merge: phases.merge,
            absorb: phases.absorb,
            aggregate: phases.aggregate,
            finalize_duration,
            total_duration: total_start.elapsed(),
            summary: SegmentSummary::from_segmentation(&segmentation),
        };
        Ok((segmentation, diagnostics))
    }

    /// Build the immutable scaled per-pixel feature buffer, row-major
    /// with channels interleaved per pixel.
    fn scaled_features(&self, dimensions: Dimensions, channels: usize) -> Vec<f32> {
        let mut original = vec![0.0f32; dimensions.len() * channels];
        for (c, feature) in self.features.iter().enumerate() {
            for y in 0..dimensions.height {
                for x in 0..dimensions.width {
                    let i = y as usize * dimensions.width as usize + x as usize;
                    original[i * channels + c] = feature.field.get(x, y) * feature.scale;
                }
            }
        }
        original
    }

    /// Merge passes with the averaging schedule, then absorption, then
    /// sink aggregation. Runs inside the caller's progress scope.
    fn execute_phases(
        &self,
        forest: &mut Forest,
        original: &[f32],
        progress: &mut dyn Progress,
    ) -> Result<Phases, SegmentError> {
        let merge_start = Instant::now();
        let rounds = self.average_steps + 1;
        let mut sweeps = 0u32;
        let mut unions = 0u64;
        for round in 0..rounds {
            if progress.cancelled() {
                return Err(SegmentError::Cancelled);
            }
            progress.report(round, rounds);
            if round > 0 {
                average::average_features(forest, original);
            }
            let outcome = match &self.weight {
                Some(weight) => merge::weighted_pass(
                    forest,
                    self.cutoff,
                    &weight.field,
                    weight.cutoff,
                    &mut *progress,
                )?,
                None => merge::basic_pass(forest, self.cutoff, &mut *progress)?,
            };
            sweeps += outcome.sweeps;
            unions += outcome.unions;
        }
        let merge = MergeDiagnostics {
            duration: merge_start.elapsed(),
            rounds,
            sweeps,
            unions,
            weighted: self.weight.is_some(),
        };

        let mut absorb_diagnostics = None;
        if self.min_merge > 0 {
            let absorb_start = Instant::now();
            let mut passes = 0u32;
            let mut absorbed = 0u64;
            loop {
                if progress.cancelled() {
                    return Err(SegmentError::Cancelled);
                }
                let merged = absorb::merge_small_once(forest, self.min_merge);
                passes += 1;
                absorbed += merged;
                if merged == 0 || passes >= absorb::MAX_ABSORB_PASSES {
                    break;
                }
            }
            absorb_diagnostics = Some(AbsorbDiagnostics {
                duration: absorb_start.elapsed(),
                passes,
                unions: absorbed,
            });
        }

        let reserve_sink = self.min_kill > self.min_merge;
        let mut sink = None;
        let mut aggregate_diagnostics = None;
        if reserve_sink {
            let (sink_root, gathered) = absorb::aggregate_small_once(forest, self.min_kill);
            sink = sink_root;
            aggregate_diagnostics = Some(AggregateDiagnostics {
                gathered,
                sink_pixels: sink_root.map_or(0, |root| u64::from(forest.weight(root))),
            });
        }

        Ok(Phases {
            merge,
            absorb: absorb_diagnostics,
            aggregate: aggregate_diagnostics,
            sink,
            reserve_sink,
        })
    }
}
