use crate::error::{RecommenderError, Result};
use ndarray::{Array1, ArrayView1};

/// Tolerance used when asserting that a belief sums to one.
pub const BELIEF_SUM_TOLERANCE: f64 = 1e-9;

/// Probability simplex over latent user types.
#[derive(Debug, Clone, PartialEq)]
pub struct BeliefState {
    probs: Array1<f64>,
}

impl BeliefState {
    /// Normalizes non-negative weights into a belief.
    pub fn new(weights: Array1<f64>) -> Result<Self> {
        for (col, &value) in weights.iter().enumerate() {
            if !value.is_finite() || value < 0.0 {
                return Err(RecommenderError::ProbabilityOutOfRange {
                    what: "belief",
                    row: 0,
                    col,
                    value,
                });
            }
        }
        let sum = weights.sum();
        Self::normalized(weights).ok_or(RecommenderError::InvalidDistribution { sum })
    }

    pub fn uniform(type_count: usize) -> Result<Self> {
        Self::new(Array1::from_elem(type_count, 1.0))
    }

    /// Divides by the total mass, or returns `None` when that mass is not a
    /// positive finite number.
    pub(crate) fn normalized(weights: Array1<f64>) -> Option<Self> {
        let mass = weights.sum();
        if !(mass.is_finite() && mass > 0.0) {
            return None;
        }
        Some(Self {
            probs: weights / mass,
        })
    }

    pub fn probabilities(&self) -> ArrayView1<'_, f64> {
        self.probs.view()
    }

    pub fn prob(&self, user_type: usize) -> f64 {
        self.probs.get(user_type).copied().unwrap_or(0.0)
    }

    pub fn type_count(&self) -> usize {
        self.probs.len()
    }

    pub fn mass(&self) -> f64 {
        self.probs.sum()
    }

    /// Shannon entropy in nats.
    pub fn entropy(&self) -> f64 {
        self.probs
            .iter()
            .filter(|p| **p > 0.0)
            .map(|p| -p * p.ln())
            .sum()
    }

    /// Most probable type; the lowest index wins ties.
    pub fn most_likely_type(&self) -> usize {
        let mut best = 0;
        for (idx, &p) in self.probs.iter().enumerate() {
            if p > self.probs[best] {
                best = idx;
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn normalizes_weights() {
        let belief = BeliefState::new(array![1.0, 3.0]).unwrap();
        assert!((belief.prob(0) - 0.25).abs() < 1e-12);
        assert!((belief.prob(1) - 0.75).abs() < 1e-12);
        assert!((belief.mass() - 1.0).abs() < BELIEF_SUM_TOLERANCE);
    }

    #[test]
    fn rejects_zero_mass() {
        let err = BeliefState::new(array![0.0, 0.0]).unwrap_err();
        assert_eq!(err, RecommenderError::InvalidDistribution { sum: 0.0 });
    }

    #[test]
    fn rejects_negative_weight() {
        let err = BeliefState::new(array![0.5, -0.1]).unwrap_err();
        assert!(matches!(
            err,
            RecommenderError::ProbabilityOutOfRange { what: "belief", col: 1, .. }
        ));
    }

    #[test]
    fn uniform_entropy_is_log_of_types() {
        let belief = BeliefState::uniform(4).unwrap();
        assert!((belief.entropy() - 4.0_f64.ln()).abs() < 1e-12);
        assert_eq!(belief.most_likely_type(), 0);
    }

    #[test]
    fn point_mass_has_zero_entropy() {
        let belief = BeliefState::new(array![0.0, 1.0, 0.0]).unwrap();
        assert_eq!(belief.entropy(), 0.0);
        assert_eq!(belief.most_likely_type(), 1);
        assert_eq!(belief.prob(7), 0.0);
    }
}
