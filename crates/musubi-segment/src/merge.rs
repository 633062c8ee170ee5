//! Basic and boundary-weighted merge passes.
//!
//! A pass sweeps every pixel's forward grid neighbors (east and south,
//! so each adjacent pair is tested once), compares the two current
//! roots' feature vectors against the cutoff, and unions segments that
//! are close enough. Sweeps repeat until one completes with zero
//! unions.
//!
//! The weighted variant adds the boundary constraint: a union is only
//! accepted when the mean of the weight channel over the two segments'
//! touching member pixels reaches the boundary cutoff, so similar
//! segments still refuse to merge across a strong edge. Finding the
//! touching pixels walks both segments' member lists, which is the
//! expensive part of weighted mode.

use crate::forest::{Forest, NO_NODE};
use crate::progress::Progress;
use crate::types::{ScalarField, SegmentError};

/// Counters from one pass-to-convergence.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct PassOutcome {
    /// Full sweeps performed, including the final zero-union sweep.
    pub(crate) sweeps: u32,
    /// Total unions accepted.
    pub(crate) unions: u64,
}

/// Run the basic merge pass to its fixed point.
///
/// # Errors
///
/// Returns [`SegmentError::Cancelled`] if the progress observer
/// requests cancellation at a row boundary.
pub(crate) fn basic_pass(
    forest: &mut Forest,
    cutoff: f32,
    progress: &mut dyn Progress,
) -> Result<PassOutcome, SegmentError> {
    run_pass(forest, cutoff, None, progress)
}

/// Run the boundary-weighted merge pass to its fixed point.
///
/// # Errors
///
/// Returns [`SegmentError::Cancelled`] if the progress observer
/// requests cancellation at a row boundary.
pub(crate) fn weighted_pass(
    forest: &mut Forest,
    cutoff: f32,
    weight: &ScalarField,
    weight_cutoff: f32,
    progress: &mut dyn Progress,
) -> Result<PassOutcome, SegmentError> {
    run_pass(forest, cutoff, Some((weight, weight_cutoff)), progress)
}

#[allow(clippy::cast_possible_truncation)]
fn run_pass(
    forest: &mut Forest,
    cutoff: f32,
    weight: Option<(&ScalarField, f32)>,
    progress: &mut dyn Progress,
) -> Result<PassOutcome, SegmentError> {
    let width = forest.width();
    let height = forest.height();
    let rows = height as u32;
    let mut outcome = PassOutcome::default();

    progress.push();
    loop {
        outcome.sweeps += 1;
        let mut sweep_unions = 0u64;

        for y in 0..height {
            if progress.cancelled() {
                progress.pop();
                return Err(SegmentError::Cancelled);
            }
            progress.report(y as u32, rows);

            for x in 0..width {
                let i = forest.index(x, y);
                if forest.stop(i) {
                    continue;
                }
                // True while some forward neighbor stays in a different
                // segment, which forbids memoizing this pixel.
                let mut blocked = false;

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
                    if forest.distance(ri, rj) > cutoff {
                        blocked = true;
                        continue;
                    }
                    if let Some((field, weight_cutoff)) = weight {
                        let mean = boundary_mean(forest, field, ri, rj);
                        if mean < weight_cutoff {
                            blocked = true;
                            continue;
                        }
                        let root = forest.union(ri, rj);
                        forest.add_edge_accum(root, mean);
                    } else {
                        forest.union(ri, rj);
                    }
                    sweep_unions += 1;
                }

                if !blocked {
                    forest.set_stop(i);
                }
            }
        }

        outcome.unions += sweep_unions;
        if sweep_unions == 0 {
            break;
        }
    }
    progress.pop();

    Ok(outcome)
}

/// Mean of the weight channel over the pixels where the segments rooted
/// at `ra` and `rb` touch.
///
/// Walks both member lists; a member counts as touching when one of its
/// 4-neighbors belongs to the other segment. Both roots are sampled, so
/// the mean covers both sides of the shared border.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn boundary_mean(forest: &mut Forest, field: &ScalarField, ra: usize, rb: usize) -> f32 {
    let width = forest.width();
    let height = forest.height();
    let mut sum = 0.0f32;
    let mut count = 0u32;

    for (own, other) in [(ra, rb), (rb, ra)] {
        let mut cur = own;
        while cur != NO_NODE {
            let (x, y) = forest.position(cur);
            let mut touching = false;
            if x > 0 && forest.find(forest.index(x - 1, y)) == other {
                touching = true;
            }
            if !touching && x + 1 < width && forest.find(forest.index(x + 1, y)) == other {
                touching = true;
            }
            if !touching && y > 0 && forest.find(forest.index(x, y - 1)) == other {
                touching = true;
            }
            if !touching && y + 1 < height && forest.find(forest.index(x, y + 1)) == other {
                touching = true;
            }
            if touching {
                sum += field.get(x as u32, y as u32);
                count += 1;
            }
            cur = forest.next_member(cur);
        }
    }

    debug_assert!(count > 0, "adjacent segments must share touching members");
    if count == 0 {
        return f32::NEG_INFINITY;
    }
    sum / count as f32
}
