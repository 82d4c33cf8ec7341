//! One-step greedy scoring over the surviving options.

use super::OptionSet;
use crate::belief::BeliefState;
use ndarray::Array1;

/// Weight on the expected like probability when survival is informative.
pub const LIKE_WEIGHT: f64 = 0.7;
/// Weight on the expected survival-after-dislike probability.
pub const SURVIVAL_WEIGHT: f64 = 0.3;

/// Per-option scores under `belief`.
///
/// With an all-zero survival matrix the score is the expected like
/// probability `L·p`; otherwise it is the blend `0.7·L·p + 0.3·S·p`.
pub fn scores(options: &OptionSet, belief: &BeliefState) -> Array1<f64> {
    let p = belief.probabilities();
    let engagement = options.likes().dot(&p);
    if options.survival_is_zero() {
        return engagement;
    }
    let retention = options.survival().dot(&p);
    engagement * LIKE_WEIGHT + retention * SURVIVAL_WEIGHT
}

/// Index of the maximal score; the lowest index wins ties.
pub fn choose(options: &OptionSet, belief: &BeliefState) -> usize {
    argmax_first(&scores(options, belief))
}

pub fn argmax_first(values: &Array1<f64>) -> usize {
    let mut best = 0;
    for (idx, &value) in values.iter().enumerate() {
        if value > values[best] {
            best = idx;
        }
    }
    best
}
