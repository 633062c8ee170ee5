//! Shared types for the musubi segmentation engine.

use serde::{Deserialize, Serialize};

/// Grid dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Total number of grid cells.
    #[must_use]
    pub const fn len(self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Returns `true` if either dimension is zero.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// A 2D scalar grid, indexable by integer `(x, y)`.
///
/// This is the engine's view of one input channel: a fixed-size,
/// row-major `f32` buffer. Feature channels and the optional
/// boundary-weight channel are all `ScalarField`s of identical
/// dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarField {
    dimensions: Dimensions,
    data: Vec<f32>,
}

impl ScalarField {
    /// Create a field filled with zeros.
    #[must_use]
    pub fn new(dimensions: Dimensions) -> Self {
        Self {
            dimensions,
            data: vec![0.0; dimensions.len()],
        }
    }

    /// Create a field by evaluating `f` at every `(x, y)`.
    #[must_use]
    pub fn from_fn(dimensions: Dimensions, mut f: impl FnMut(u32, u32) -> f32) -> Self {
        let mut data = Vec::with_capacity(dimensions.len());
        for y in 0..dimensions.height {
            for x in 0..dimensions.width {
                data.push(f(x, y));
            }
        }
        Self { dimensions, data }
    }

    /// Create a field from a row-major buffer.
    ///
    /// Returns `None` if `data.len()` does not equal `width * height`.
    #[must_use]
    pub fn from_raw(dimensions: Dimensions, data: Vec<f32>) -> Option<Self> {
        (data.len() == dimensions.len()).then_some(Self { dimensions, data })
    }

    /// Field dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Value at `(x, y)`.
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.data[y as usize * self.dimensions.width as usize + x as usize]
    }

    /// Overwrite the value at `(x, y)`.
    pub fn set(&mut self, x: u32, y: u32, value: f32) {
        self.data[y as usize * self.dimensions.width as usize + x as usize] = value;
    }

    /// The raw row-major buffer.
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

/// A 2D segment-id grid, row-major `u32`.
///
/// The output counterpart of [`ScalarField`]. Supports in-place
/// resizing so it can serve as the auto-resizing output container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelField {
    dimensions: Dimensions,
    data: Vec<u32>,
}

impl LabelField {
    /// Create a label field filled with zeros.
    #[must_use]
    pub fn new(dimensions: Dimensions) -> Self {
        Self {
            dimensions,
            data: vec![0; dimensions.len()],
        }
    }

    /// Field dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Label at `(x, y)`.
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> u32 {
        self.data[y as usize * self.dimensions.width as usize + x as usize]
    }

    /// Overwrite the label at `(x, y)`.
    pub fn set(&mut self, x: u32, y: u32, value: u32) {
        self.data[y as usize * self.dimensions.width as usize + x as usize] = value;
    }

    /// Resize to `dimensions`, discarding previous contents.
    pub fn resize_to(&mut self, dimensions: Dimensions) {
        self.dimensions = dimensions;
        self.data.clear();
        self.data.resize(dimensions.len(), 0);
    }

    /// The raw row-major buffer.
    #[must_use]
    pub fn as_slice(&self) -> &[u32] {
        &self.data
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [u32] {
        &mut self.data
    }
}

/// Scalar configuration for the segmentation engine.
///
/// Feature channels and the optional boundary-weight channel are added
/// through [`Segmenter`](crate::Segmenter) methods because they carry
/// grid data; everything scalar lives here so runs are reproducible
/// from a serialized config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmenterConfig {
    /// Maximum feature-space distance between two segments' mean
    /// vectors for a merge to be accepted.
    pub cutoff: f32,

    /// Minimum segment size in pixels. Segments smaller than this are
    /// merged into their nearest neighboring segment regardless of the
    /// cutoff. Zero disables absorption.
    pub min_merge: u32,

    /// Kill threshold for the absorption sink. Only meaningful when it
    /// exceeds `min_merge`: every segment still smaller than this after
    /// absorption collapses into the reserved sink segment, id 0.
    pub min_kill: u32,

    /// Number of averaging rounds. Each round recomputes segment mean
    /// vectors from the original per-pixel features and reruns the
    /// merge pass. Zero means a single merge pass only.
    pub average_steps: u32,
}

impl SegmenterConfig {
    /// Default merge cutoff distance.
    pub const DEFAULT_CUTOFF: f32 = 1.0;
    /// Default minimum-merge size (disabled).
    pub const DEFAULT_MIN_MERGE: u32 = 0;
    /// Default kill threshold (disabled).
    pub const DEFAULT_MIN_KILL: u32 = 0;
    /// Default number of averaging rounds.
    pub const DEFAULT_AVERAGE_STEPS: u32 = 0;
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            cutoff: Self::DEFAULT_CUTOFF,
            min_merge: Self::DEFAULT_MIN_MERGE,
            min_kill: Self::DEFAULT_MIN_KILL,
            average_steps: Self::DEFAULT_AVERAGE_STEPS,
        }
    }
}

/// Errors reported by the segmentation engine.
///
/// These are caller contract violations surfaced as values rather than
/// assertions; internal consistency breaks are `debug_assert!`s, since
/// they indicate an engine bug rather than misuse.
#[derive(Debug, thiserror::Error)]
pub enum SegmentError {
    /// `run` was called with no feature channels configured.
    #[error("no feature channels were added before running")]
    NoFeatures,

    /// A channel's dimensions differ from previously added channels.
    #[error(
        "channel dimensions {actual_width}x{actual_height} do not match \
         configured grid {expected_width}x{expected_height}"
    )]
    DimensionMismatch {
        /// Width the engine was configured with.
        expected_width: u32,
        /// Height the engine was configured with.
        expected_height: u32,
        /// Width of the offending channel.
        actual_width: u32,
        /// Height of the offending channel.
        actual_height: u32,
    },

    /// A caller-provided output field has the wrong dimensions.
    #[error(
        "output field is {actual_width}x{actual_height} but the \
         segmentation is {expected_width}x{expected_height}"
    )]
    OutputSizeMismatch {
        /// Width of the segmented grid.
        expected_width: u32,
        /// Height of the segmented grid.
        expected_height: u32,
        /// Width of the provided output field.
        actual_width: u32,
        /// Height of the provided output field.
        actual_height: u32,
    },

    /// The progress observer requested cancellation.
    #[error("segmentation was cancelled")]
    Cancelled,
}

/// Result of a completed segmentation run: one dense id per pixel.
///
/// Produced by consuming a [`Segmenter`](crate::Segmenter); read-only
/// from then on. Ids are dense over `[0, segments())`, assigned in
/// first-seen row-major order. When the kill threshold exceeds the
/// minimum-merge size, id 0 is the reserved absorption sink and live
/// segments number from 1; the sink id exists (and counts toward
/// `segments()`) even when it labels no pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct Segmentation {
    pub(crate) labels: Vec<u32>,
    pub(crate) dimensions: Dimensions,
    pub(crate) segments: u32,
    /// Per-segment mean feature vectors, `segments * channels` long.
    /// An empty sink's row is all zeros.
    pub(crate) mean_features: Vec<f32>,
    pub(crate) channels: usize,
}

impl Segmentation {
    /// Number of segments generated, including the reserved sink when
    /// kill mode was active.
    #[must_use]
    pub const fn segments(&self) -> u32 {
        self.segments
    }

    /// Dimensions of the segmented grid.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Segment id of the pixel at `(x, y)`.
    #[must_use]
    pub fn label(&self, x: u32, y: u32) -> u32 {
        self.labels[y as usize * self.dimensions.width as usize + x as usize]
    }

    /// The raw row-major id buffer.
    #[must_use]
    pub fn labels(&self) -> &[u32] {
        &self.labels
    }

    /// Mean feature vector of segment `id`, in scaled feature space.
    ///
    /// This is the segment's representative vector as of finalization —
    /// the value the last merge decisions were made against.
    #[must_use]
    pub fn mean_feature(&self, id: u32) -> &[f32] {
        let start = id as usize * self.channels;
        &self.mean_features[start..start + self.channels]
    }

    /// Pixel count of every segment, indexed by id.
    #[must_use]
    pub fn segment_sizes(&self) -> Vec<u64> {
        let mut sizes = vec![0u64; self.segments as usize];
        for &label in &self.labels {
            sizes[label as usize] += 1;
        }
        sizes
    }

    /// Copy the ids into a caller-owned fixed-size field.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::OutputSizeMismatch`] if `out` does not
    /// have the segmentation's dimensions. Use
    /// [`to_label_field`](Self::to_label_field) for the resizing
    /// variant.
    pub fn write_into(&self, out: &mut LabelField) -> Result<(), SegmentError> {
        if out.dimensions() != self.dimensions {
            return Err(SegmentError::OutputSizeMismatch {
                expected_width: self.dimensions.width,
                expected_height: self.dimensions.height,
                actual_width: out.dimensions().width,
                actual_height: out.dimensions().height,
            });
        }
        out.as_mut_slice().copy_from_slice(&self.labels);
        Ok(())
    }

    /// Copy the ids into a freshly sized [`LabelField`].
    ///
    /// The auto-resizing counterpart of [`write_into`](Self::write_into):
    /// the output always matches the segmentation's dimensions.
    #[must_use]
    pub fn to_label_field(&self) -> LabelField {
        let mut out = LabelField::new(self.dimensions);
        out.as_mut_slice().copy_from_slice(&self.labels);
        out
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const DIMS: Dimensions = Dimensions {
        width: 3,
        height: 2,
    };

    #[test]
    fn dimensions_len() {
        assert_eq!(DIMS.len(), 6);
        assert!(!DIMS.is_empty());
        assert!(
            Dimensions {
                width: 0,
                height: 5,
            }
            .is_empty()
        );
    }

    #[test]
    fn scalar_field_from_fn_row_major() {
        let field = ScalarField::from_fn(DIMS, |x, y| (y * 10 + x) as f32);
        assert_eq!(field.get(0, 0), 0.0);
        assert_eq!(field.get(2, 0), 2.0);
        assert_eq!(field.get(0, 1), 10.0);
        assert_eq!(field.as_slice(), &[0.0, 1.0, 2.0, 10.0, 11.0, 12.0]);
    }

    #[test]
    fn scalar_field_from_raw_validates_length() {
        assert!(ScalarField::from_raw(DIMS, vec![0.0; 6]).is_some());
        assert!(ScalarField::from_raw(DIMS, vec![0.0; 5]).is_none());
    }

    #[test]
    fn scalar_field_set_get() {
        let mut field = ScalarField::new(DIMS);
        field.set(1, 1, 7.5);
        assert_eq!(field.get(1, 1), 7.5);
        assert_eq!(field.get(1, 0), 0.0);
    }

    #[test]
    fn label_field_resize_discards_contents() {
        let mut field = LabelField::new(DIMS);
        field.set(2, 1, 9);
        field.resize_to(Dimensions {
            width: 2,
            height: 2,
        });
        assert_eq!(
            field.dimensions(),
            Dimensions {
                width: 2,
                height: 2,
            },
        );
        assert_eq!(field.as_slice(), &[0, 0, 0, 0]);
    }

    #[test]
    fn config_defaults() {
        let config = SegmenterConfig::default();
        assert!((config.cutoff - 1.0).abs() < f32::EPSILON);
        assert_eq!(config.min_merge, 0);
        assert_eq!(config.min_kill, 0);
        assert_eq!(config.average_steps, 0);
    }

    #[test]
    fn config_serde_round_trip() {
        let config = SegmenterConfig {
            cutoff: 2.5,
            min_merge: 20,
            min_kill: 50,
            average_steps: 3,
        };
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: SegmenterConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn error_no_features_display() {
        assert_eq!(
            SegmentError::NoFeatures.to_string(),
            "no feature channels were added before running",
        );
    }

    #[test]
    fn error_dimension_mismatch_display() {
        let err = SegmentError::DimensionMismatch {
            expected_width: 4,
            expected_height: 3,
            actual_width: 4,
            actual_height: 2,
        };
        assert_eq!(
            err.to_string(),
            "channel dimensions 4x2 do not match configured grid 4x3",
        );
    }

    #[test]
    fn error_cancelled_display() {
        assert_eq!(
            SegmentError::Cancelled.to_string(),
            "segmentation was cancelled",
        );
    }
}
