//! Dense renumbering of live roots into the output id array.
//!
//! A single walk over all pixels resolves each root and assigns dense
//! ids in first-seen row-major order. When the kill threshold exceeds
//! the minimum-merge size, id 0 is reserved for the sink segment: it is
//! forced onto the sink root when one exists and held empty otherwise,
//! and live segments number from 1.

use crate::forest::Forest;
use crate::progress::Progress;
use crate::types::{Dimensions, SegmentError, Segmentation};

/// Walk all pixels, assign dense segment ids, and materialize the
/// output buffer plus per-segment mean feature vectors.
///
/// # Errors
///
/// Returns [`SegmentError::Cancelled`] if the progress observer
/// requests cancellation at a row boundary.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn finalize(
    forest: &mut Forest,
    sink: Option<usize>,
    reserve_sink: bool,
    progress: &mut dyn Progress,
) -> Result<Segmentation, SegmentError> {
    let width = forest.width();
    let height = forest.height();
    let len = forest.len();
    let channels = forest.channels();

    // Root-indexed id map; u32::MAX marks "not yet assigned".
    let mut assigned = vec![u32::MAX; len];
    let mut next_id: u32 = u32::from(reserve_sink);
    if let Some(sink) = sink {
        debug_assert!(reserve_sink);
        let sink_root = forest.find(sink);
        assigned[sink_root] = 0;
    }

    let mut labels = vec![0u32; len];
    progress.push();
    for y in 0..height {
        if progress.cancelled() {
            progress.pop();
            return Err(SegmentError::Cancelled);
        }
        progress.report(y as u32, height as u32);
        progress.push();
        for x in 0..width {
            progress.report(x as u32, width as u32);
            let i = forest.index(x, y);
            let root = forest.find(i);
            if assigned[root] == u32::MAX {
                assigned[root] = next_id;
                next_id += 1;
            }
            labels[i] = assigned[root];
        }
        progress.pop();
    }
    progress.pop();

    let segments = next_id;
    let mut mean_features = vec![0.0f32; segments as usize * channels];
    for root in 0..len {
        let id = assigned[root];
        if id != u32::MAX {
            debug_assert!(forest.is_root(root));
            let base = id as usize * channels;
            mean_features[base..base + channels].copy_from_slice(forest.feature(root));
        }
    }

    Ok(Segmentation {
        labels,
        dimensions: Dimensions {
            width: width as u32,
            height: height as u32,
        },
        segments,
        mean_features,
        channels,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::progress::Silent;

    fn line_forest(values: &[f32]) -> Forest {
        let dims = Dimensions {
            width: values.len() as u32,
            height: 1,
        };
        Forest::new(dims, 1, false, values.to_vec())
    }

    #[test]
    fn ids_follow_first_seen_order() {
        let mut f = line_forest(&[0.0, 1.0, 2.0, 3.0]);
        f.union(1, 3);
        let seg = finalize(&mut f, None, false, &mut Silent).unwrap();
        // Pixel 0 seen first, then the {1,3} segment, then pixel 2.
        assert_eq!(seg.labels(), &[0, 1, 2, 1]);
        assert_eq!(seg.segments(), 3);
    }

    #[test]
    fn sink_root_is_forced_to_id_zero() {
        let mut f = line_forest(&[0.0, 1.0, 2.0]);
        let seg = finalize(&mut f, Some(2), true, &mut Silent).unwrap();
        assert_eq!(seg.labels(), &[1, 2, 0]);
        assert_eq!(seg.segments(), 3);
    }

    #[test]
    fn reserved_sink_counts_even_when_empty() {
        let mut f = line_forest(&[0.0, 1.0]);
        let seg = finalize(&mut f, None, true, &mut Silent).unwrap();
        assert_eq!(seg.labels(), &[1, 2]);
        assert_eq!(seg.segments(), 3);
        assert_eq!(seg.segment_sizes(), vec![0, 1, 1]);
    }

    #[test]
    fn mean_features_track_roots() {
        let mut f = line_forest(&[2.0, 4.0, 9.0]);
        f.union(0, 1);
        let seg = finalize(&mut f, None, false, &mut Silent).unwrap();
        assert_eq!(seg.segments(), 2);
        assert!((seg.mean_feature(0)[0] - 3.0).abs() < 1e-6);
        assert!((seg.mean_feature(1)[0] - 9.0).abs() < 1e-6);
    }
}
