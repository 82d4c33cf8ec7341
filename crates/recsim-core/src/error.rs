use crate::model::signal::Signal;
use thiserror::Error;

/// Fatal conditions surfaced at the construction or update boundary.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecommenderError {
    #[error("{what} has shape {found:?} but {expected:?} was required")]
    ShapeMismatch {
        what: &'static str,
        expected: (usize, usize),
        found: (usize, usize),
    },
    #[error("{what} must not be empty")]
    EmptyMatrix { what: &'static str },
    #[error("{what}[{row}][{col}] = {value} lies outside [0, 1]")]
    ProbabilityOutOfRange {
        what: &'static str,
        row: usize,
        col: usize,
        value: f64,
    },
    #[error("distribution sums to {sum} instead of 1")]
    InvalidDistribution { sum: f64 },
    #[error("posterior collapsed after {signal} on option {option} (mass {mass})")]
    DegeneratePosterior {
        option: usize,
        signal: Signal,
        mass: f64,
    },
    #[error("option {index} is outside the {len} available options")]
    OptionOutOfRange { index: usize, len: usize },
    #[error("pruning removed every option")]
    EmptyOptionSet,
    #[error("update called without a pending recommendation")]
    NoPendingRecommendation,
}

pub type Result<T> = std::result::Result<T, RecommenderError>;
