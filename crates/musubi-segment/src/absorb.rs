//! Small-segment absorption and the kill-threshold sink.
//!
//! After the merge passes converge, segments below the minimum-merge
//! size are folded into their nearest border-sharing neighbor by
//! feature distance, ignoring the cutoff entirely. Optionally, when the
//! kill threshold exceeds the minimum-merge size, everything still
//! below the kill threshold is gathered into a single sink segment that
//! finalization pins to id 0.

use crate::forest::{Forest, NO_NODE};

/// Upper bound on absorption sweeps per run. Termination is already
/// guaranteed — every union strictly reduces the live-segment count —
/// so the cap only bounds worst-case latency.
pub(crate) const MAX_ABSORB_PASSES: u32 = 64;

/// Merge every undersized segment into its nearest bordering segment.
///
/// One sweep over all adjacent pixel pairs records, for each live root
/// below `min_size`, the closest neighboring segment in feature space;
/// each recorded root is then unioned into its candidate regardless of
/// the cutoff. Returns the number of unions performed; zero means no
/// undersized segment had a neighbor left to join (or none existed).
pub(crate) fn merge_small_once(forest: &mut Forest, min_size: u32) -> u64 {
    let width = forest.width();
    let height = forest.height();
    let len = forest.len();

    // Nearest-neighbor scratch, indexed by root id. Only entries for
    // undersized roots are ever populated.
    let mut best_dist = vec![f32::INFINITY; len];
    let mut best_cand = vec![NO_NODE; len];

    for y in 0..height {
        for x in 0..width {
            let i = forest.index(x, y);
            for (nx, ny) in [(x + 1, y), (x, y + 1)] {
                if nx >= width || ny >= height {
                    continue;
                }
                let j = forest.index(nx, ny);
                let ri = forest.find(i);
                let rj = forest.find(j);
                if ri == rj {
                    continue;
                }
                let under_i = forest.weight(ri) < min_size;
                let under_j = forest.weight(rj) < min_size;
                if !under_i && !under_j {
                    continue;
                }
                let distance = forest.distance(ri, rj);
                if under_i && distance < best_dist[ri] {
                    best_dist[ri] = distance;
                    best_cand[ri] = rj;
                }
                if under_j && distance < best_dist[rj] {
                    best_dist[rj] = distance;
                    best_cand[rj] = ri;
                }
            }
        }
    }

    let mut unions = 0u64;
    for root in 0..len {
        let candidate = best_cand[root];
        if candidate == NO_NODE {
            continue;
        }
        // Earlier unions in this loop may have already joined the two;
        // re-resolve both sides before committing.
        let current = forest.find(root);
        let target = forest.find(candidate);
        if current != target {
            forest.union(current, target);
            unions += 1;
        }
    }
    unions
}

/// Gather every segment below `kill_size` into one sink super-segment.
///
/// Qualification is decided before any aggregation union, so the sink
/// growing past the threshold does not exempt later victims. Returns
/// the sink root (`None` when nothing qualified) and the number of
/// segments gathered.
pub(crate) fn aggregate_small_once(forest: &mut Forest, kill_size: u32) -> (Option<usize>, u32) {
    let victims: Vec<usize> = (0..forest.len())
        .filter(|&i| forest.is_root(i) && forest.weight(i) < kill_size)
        .collect();

    let mut gathered = 0u32;
    let mut sink: Option<usize> = None;
    for victim in victims {
        gathered += 1;
        sink = Some(match sink {
            None => victim,
            Some(root) => forest.union(root, victim),
        });
    }
    (sink, gathered)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::merge::basic_pass;
    use crate::progress::Silent;
    use crate::types::Dimensions;

    fn line_forest(values: &[f32]) -> Forest {
        let dims = Dimensions {
            width: values.len() as u32,
            height: 1,
        };
        Forest::new(dims, 1, false, values.to_vec())
    }

    #[test]
    fn undersized_segments_join_nearest_neighbor() {
        // Two 3-pixel segments, both below a minimum size of 4. Each
        // absorbs into the other, leaving one segment whose mean is the
        // weight-weighted average of all six pixels.
        let mut f = line_forest(&[0.0, 0.0, 0.0, 10.0, 10.0, 10.0]);
        basic_pass(&mut f, 1.0, &mut Silent).unwrap();

        let unions = merge_small_once(&mut f, 4);
        assert_eq!(unions, 1);
        let root = f.find(0);
        assert_eq!(f.weight(root), 6);
        assert!((f.feature(root)[0] - 5.0).abs() < 1e-6);
    }

    #[test]
    fn absorption_ignores_the_cutoff() {
        // Distance between the segments is 10, far beyond any cutoff the
        // merge pass ran with; absorption merges anyway.
        let mut f = line_forest(&[0.0, 10.0, 10.0, 10.0]);
        basic_pass(&mut f, 1.0, &mut Silent).unwrap();
        assert_eq!(merge_small_once(&mut f, 2), 1);
        let root = f.find(0);
        assert_eq!(f.weight(root), 4);
    }

    #[test]
    fn nearest_neighbor_wins_by_feature_distance() {
        // The middle 1-pixel segment (value 6) borders segments at 0 and
        // 10; it must join the closer one (10).
        let mut f = line_forest(&[0.0, 0.0, 6.0, 10.0, 10.0]);
        basic_pass(&mut f, 1.0, &mut Silent).unwrap();
        merge_small_once(&mut f, 2);
        assert_eq!(f.find(2), f.find(3));
        assert_ne!(f.find(0), f.find(2));
    }

    #[test]
    fn absorption_is_idempotent_once_nothing_is_small() {
        let mut f = line_forest(&[0.0, 0.0, 0.0, 10.0, 10.0, 10.0]);
        basic_pass(&mut f, 1.0, &mut Silent).unwrap();
        assert_eq!(merge_small_once(&mut f, 2), 0);
        // Both segments meet the threshold; the partition is unchanged.
        assert_ne!(f.find(0), f.find(5));
        let root0 = f.find(0);
        assert_eq!(f.weight(root0), 3);
        let root5 = f.find(5);
        assert_eq!(f.weight(root5), 3);
    }

    #[test]
    fn aggregate_gathers_all_below_kill_threshold() {
        let mut f = line_forest(&[0.0, 0.0, 0.0, 0.0, 7.0, 3.0]);
        basic_pass(&mut f, 1.0, &mut Silent).unwrap();
        // Segments: {0..3} (4 px), {4} (1 px), {5} (1 px).
        let (sink, gathered) = aggregate_small_once(&mut f, 3);
        let sink = sink.unwrap();
        assert_eq!(gathered, 2);
        let sink_root = f.find(sink);
        assert_eq!(f.weight(sink_root), 2);
        assert_eq!(f.find(4), f.find(5));
        assert_ne!(f.find(0), f.find(4));
    }

    #[test]
    fn aggregate_with_no_victims_returns_none() {
        let mut f = line_forest(&[0.0, 0.0, 0.0]);
        basic_pass(&mut f, 1.0, &mut Silent).unwrap();
        let (sink, gathered) = aggregate_small_once(&mut f, 2);
        assert!(sink.is_none());
        assert_eq!(gathered, 0);
    }

    #[test]
    fn aggregate_qualification_precedes_growth() {
        // Three 1-pixel segments and a kill threshold of 2: the sink
        // reaches weight 2 after the first union, but the third victim
        // qualified up front and is still gathered.
        let mut f = line_forest(&[0.0, 5.0, 10.0]);
        basic_pass(&mut f, 1.0, &mut Silent).unwrap();
        let (sink, gathered) = aggregate_small_once(&mut f, 2);
        assert_eq!(gathered, 3);
        let sink_root = f.find(sink.unwrap());
        assert_eq!(f.weight(sink_root), 3);
    }
}
