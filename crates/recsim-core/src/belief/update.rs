//! Bayesian revision of the type posterior after observing feedback.

use super::BeliefState;
use crate::error::{RecommenderError, Result};
use crate::model::signal::Signal;
use crate::recommender::OptionSet;
use ndarray::Array1;

/// Returns the posterior after `signal` was observed for option `index`.
///
/// A like multiplies each type's mass by `likes[index][j]`. A dislike multiplies
/// it by `(1 - likes[index][j]) * survival[index][j]`, so the result is
/// conditioned on the user having stayed; it must not be applied after the user
/// left.
pub fn posterior(
    options: &OptionSet,
    index: usize,
    signal: Signal,
    belief: &BeliefState,
) -> Result<BeliefState> {
    if index >= options.len() {
        return Err(RecommenderError::OptionOutOfRange {
            index,
            len: options.len(),
        });
    }

    let prior = belief.probabilities();
    let likes = options.likes().row(index);
    let weights: Array1<f64> = match signal {
        Signal::Liked => &prior * &likes,
        Signal::Disliked => {
            let miss = likes.mapv(|l| 1.0 - l);
            let survival = options.survival().row(index);
            &(&prior * &miss) * &survival
        }
    };

    let mass = weights.sum();
    BeliefState::normalized(weights).ok_or(RecommenderError::DegeneratePosterior {
        option: options.original_index(index),
        signal,
        mass,
    })
}
