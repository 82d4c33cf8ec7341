//! Stateful recommendation sessions.
//!
//! A session is the pair of an immutable [`OptionSet`] (pruned like and
//! survival rows) and a mutable [`BeliefState`]. Scoring lives in `policy`,
//! the one-time row removal in `pruner`, and the posterior update in
//! [`crate::belief::posterior`].

pub mod policy;
pub mod pruner;

use crate::belief::{self, BeliefState};
use crate::error::{RecommenderError, Result};
use crate::model::instance::ProblemInstance;
use crate::model::signal::Signal;
use ndarray::{Array2, Axis};
use pruner::OptionPruner;
use serde::Serialize;

/// Options that survived pruning, with their rows in the caller's matrices.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionSet {
    likes: Array2<f64>,
    survival: Array2<f64>,
    original: Vec<usize>,
    removed: Vec<usize>,
    survival_is_zero: bool,
}

impl OptionSet {
    pub fn from_instance(instance: &ProblemInstance) -> Result<Self> {
        let survival_is_zero = instance.survival().iter().all(|v| *v == 0.0);
        let outcome = OptionPruner::prune(instance.likes().view(), instance.survival().view());
        if outcome.kept.is_empty() {
            return Err(RecommenderError::EmptyOptionSet);
        }

        Ok(Self {
            likes: instance.likes().select(Axis(0), &outcome.kept),
            survival: instance.survival().select(Axis(0), &outcome.kept),
            original: outcome.kept,
            removed: outcome.removed,
            survival_is_zero,
        })
    }

    pub fn len(&self) -> usize {
        self.original.len()
    }

    pub fn is_empty(&self) -> bool {
        self.original.is_empty()
    }

    pub fn likes(&self) -> &Array2<f64> {
        &self.likes
    }

    pub fn survival(&self) -> &Array2<f64> {
        &self.survival
    }

    /// Row of the caller's matrices that pruned row `index` came from.
    pub fn original_index(&self, index: usize) -> usize {
        self.original.get(index).copied().unwrap_or(index)
    }

    /// Original rows dropped during construction.
    pub fn removed(&self) -> &[usize] {
        &self.removed
    }

    pub fn survival_is_zero(&self) -> bool {
        self.survival_is_zero
    }
}

/// A chosen option expressed in both index spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Recommendation {
    /// Position within the pruned option set, in `[0, G')`.
    pub index: usize,
    /// Row in the original like/survival matrices.
    pub option: usize,
}

/// Greedy recommender tracking a posterior over user types.
#[derive(Debug, Clone)]
pub struct Recommender {
    options: OptionSet,
    belief: BeliefState,
    pending: Option<usize>,
}

impl Recommender {
    pub fn new(instance: &ProblemInstance) -> Result<Self> {
        let options = OptionSet::from_instance(instance)?;
        let belief = BeliefState::new(instance.prior().clone())?;
        Ok(Self {
            options,
            belief,
            pending: None,
        })
    }

    pub fn options(&self) -> &OptionSet {
        &self.options
    }

    pub fn belief(&self) -> &BeliefState {
        &self.belief
    }

    /// Most recent recommendation awaiting feedback.
    pub fn pending(&self) -> Option<Recommendation> {
        self.pending.map(|index| self.describe(index))
    }

    pub fn recommend(&mut self) -> Recommendation {
        let index = policy::choose(&self.options, &self.belief);
        self.pending = Some(index);
        self.describe(index)
    }

    /// Revises the belief after feedback on the last recommendation.
    ///
    /// Only call this while the user is still present. On error the belief is
    /// left as it was.
    pub fn update(&mut self, signal: Signal) -> Result<()> {
        let index = self
            .pending
            .ok_or(RecommenderError::NoPendingRecommendation)?;
        self.belief = belief::posterior(&self.options, index, signal, &self.belief)?;
        Ok(())
    }

    /// Every surviving option with its score under the current belief.
    pub fn explain(&self) -> Vec<(Recommendation, f64)> {
        policy::scores(&self.options, &self.belief)
            .iter()
            .enumerate()
            .map(|(index, &score)| (self.describe(index), score))
            .collect()
    }

    fn describe(&self, index: usize) -> Recommendation {
        Recommendation {
            index,
            option: self.options.original_index(index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, array};

    fn degenerate_instance() -> ProblemInstance {
        ProblemInstance::new(
            array![[0.5, 0.5, 0.5], [0.6, 0.7, 0.1], [0.3, 0.2, 0.4]],
            Array2::zeros((3, 3)),
            array![0.2, 0.3, 0.5],
        )
        .unwrap()
    }

    #[test]
    fn construction_drops_flat_row_and_maps_indices() {
        let recommender = Recommender::new(&degenerate_instance()).unwrap();
        let options = recommender.options();
        assert_eq!(options.len(), 2);
        assert_eq!(options.removed(), &[0]);
        assert_eq!(options.original_index(0), 1);
        assert_eq!(options.original_index(1), 2);
        assert_eq!(options.likes().row(0).to_vec(), vec![0.6, 0.7, 0.1]);
    }

    #[test]
    fn recommend_never_returns_pruned_row() {
        let mut recommender = Recommender::new(&degenerate_instance()).unwrap();
        for _ in 0..5 {
            let rec = recommender.recommend();
            assert_ne!(rec.option, 0);
            assert!(rec.index < recommender.options().len());
            recommender.update(Signal::Liked).unwrap();
        }
    }

    #[test]
    fn update_requires_pending_recommendation() {
        let mut recommender = Recommender::new(&degenerate_instance()).unwrap();
        assert_eq!(
            recommender.update(Signal::Liked),
            Err(RecommenderError::NoPendingRecommendation)
        );
    }

    #[test]
    fn failed_update_keeps_previous_belief() {
        let mut recommender = Recommender::new(&degenerate_instance()).unwrap();
        recommender.recommend();
        let before = recommender.belief().clone();
        let err = recommender.update(Signal::Disliked).unwrap_err();
        assert!(matches!(err, RecommenderError::DegeneratePosterior { .. }));
        assert_eq!(recommender.belief(), &before);
    }

    #[test]
    fn like_moves_mass_towards_liking_types() {
        let instance = ProblemInstance::new(
            array![[0.9, 0.1], [0.2, 0.3]],
            array![[1.0, 1.0], [1.0, 1.0]],
            array![0.5, 0.5],
        )
        .unwrap();
        let mut recommender = Recommender::new(&instance).unwrap();
        let rec = recommender.recommend();
        assert_eq!(rec, Recommendation { index: 0, option: 0 });
        recommender.update(Signal::Liked).unwrap();
        assert!((recommender.belief().prob(0) - 0.9).abs() < 1e-12);
        assert_eq!(recommender.pending(), Some(rec));
    }

    #[test]
    fn explain_lists_every_surviving_option() {
        let recommender = Recommender::new(&degenerate_instance()).unwrap();
        let explained = recommender.explain();
        assert_eq!(explained.len(), 2);
        assert_eq!(explained[0].0.option, 1);
        let expected = 0.6 * 0.2 + 0.7 * 0.3 + 0.1 * 0.5;
        assert!((explained[0].1 - expected).abs() < 1e-12);
    }
}
