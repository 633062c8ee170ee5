//! musubi-segment: feature-space image segmentation (sans-IO).
//!
//! Partitions a fixed-size 2D grid into contiguous segments whose
//! pixels are close in a multi-channel feature space, using a
//! union-find forest with iterative merge passes:
//!
//! 1. Every pixel starts as its own segment.
//! 2. Merge passes sweep neighboring pixel pairs and union segments
//!    whose mean feature vectors are within the cutoff, repeating to a
//!    fixed point. An optional boundary-weight channel additionally
//!    blocks merges across strong edges.
//! 3. Averaging rounds recompute segment means from the original pixel
//!    values and rerun the merge pass (coarsen-and-remerge).
//! 4. Undersized segments are absorbed into their nearest neighbor;
//!    optionally, everything below a kill threshold collapses into a
//!    reserved sink segment with id 0.
//! 5. Surviving roots are renumbered to dense ids and written to the
//!    per-pixel output buffer.
//!
//! This crate has **no I/O dependencies** — it operates on in-memory
//! scalar grids and returns structured data. The [`raster`] module
//! bridges from decoded `image` buffers to input channels.

pub mod diagnostics;
pub mod progress;
pub mod raster;
pub mod segmenter;
pub mod types;

mod absorb;
mod average;
mod finalize;
mod forest;
mod merge;

pub use progress::{Progress, Silent};
pub use segmenter::Segmenter;
pub use types::{
    Dimensions, LabelField, ScalarField, SegmentError, SegmenterConfig, Segmentation,
};

use image::GrayImage;

/// Segment a grayscale image on its luminance channel.
///
/// Convenience wrapper for the common single-channel case: builds the
/// luma feature channel, applies `config`, and runs the engine. Use
/// [`Segmenter`] directly for multiple channels, channel scales, or
/// boundary-weighted merging.
///
/// # Errors
///
/// Propagates [`SegmentError`] from configuration and the run. With a
/// single luma channel and no progress observer none of the error
/// conditions can currently trigger, but the signature keeps parity
/// with driving [`Segmenter`] directly.
pub fn segment(
    image: &GrayImage,
    config: &SegmenterConfig,
) -> Result<Segmentation, SegmentError> {
    let mut segmenter = Segmenter::with_config(config);
    segmenter.add_feature(raster::luma_channel(image), 1.0)?;
    segmenter.run()
}
