//! Averaging step of the coarsen-and-remerge schedule.
//!
//! After a merge pass converges, each live root's feature vector is
//! recomputed as the plain mean of its member pixels' *original* scaled
//! feature values. Recomputing from the immutable per-pixel buffer
//! keeps the vectors exact; a running weighted accumulation would carry
//! rounding from every intermediate merge. The caller then reruns the
//! merge pass, letting coarse region averages reveal merges invisible
//! at pixel granularity.

use crate::forest::Forest;

/// Recompute every live root's feature vector from `original`, the
/// scaled per-pixel feature buffer captured before any merging.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn average_features(forest: &mut Forest, original: &[f32]) {
    let channels = forest.channels();
    let len = forest.len();
    debug_assert_eq!(original.len(), len * channels);

    for i in 0..len {
        if forest.is_root(i) {
            let base = i * channels;
            forest.features_mut()[base..base + channels].fill(0.0);
        }
    }

    for i in 0..len {
        let root = forest.find(i);
        let root_base = root * channels;
        let pixel_base = i * channels;
        let features = forest.features_mut();
        for c in 0..channels {
            features[root_base + c] += original[pixel_base + c];
        }
    }

    for i in 0..len {
        if forest.is_root(i) {
            let count = forest.weight(i) as f32;
            let base = i * channels;
            let features = forest.features_mut();
            for c in 0..channels {
                features[base + c] /= count;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Dimensions;

    #[test]
    fn root_vectors_become_member_means() {
        let original = vec![0.0, 1.0, 8.0, 9.0];
        let mut forest = Forest::new(
            Dimensions {
                width: 4,
                height: 1,
            },
            1,
            false,
            original.clone(),
        );
        let left = forest.union(0, 1);
        let right = forest.union(2, 3);
        average_features(&mut forest, &original);
        assert!((forest.feature(left)[0] - 0.5).abs() < 1e-6);
        assert!((forest.feature(right)[0] - 8.5).abs() < 1e-6);
    }

    #[test]
    fn recomputes_from_originals_not_current_vectors() {
        let original = vec![2.0, 4.0];
        let mut forest = Forest::new(
            Dimensions {
                width: 2,
                height: 1,
            },
            1,
            false,
            original.clone(),
        );
        let root = forest.union(0, 1);
        // Scribble over the live vector; the averaging pass must restore
        // the value derived from the original buffer, not amplify drift.
        forest.features_mut()[root] = 99.0;
        average_features(&mut forest, &original);
        assert!((forest.feature(root)[0] - 3.0).abs() < 1e-6);
    }

    #[test]
    fn single_pixel_segments_keep_their_values() {
        let original = vec![1.0, 5.0, 7.0];
        let mut forest = Forest::new(
            Dimensions {
                width: 3,
                height: 1,
            },
            1,
            false,
            original.clone(),
        );
        average_features(&mut forest, &original);
        for (i, &value) in original.iter().enumerate() {
            assert!((forest.feature(i)[0] - value).abs() < 1e-6);
        }
    }
}
