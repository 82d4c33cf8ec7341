//! Validated problem instances: like matrix, survival matrix and prior.

use crate::error::{RecommenderError, Result};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

/// Maximum deviation of the prior's total mass from one.
pub const PRIOR_SUM_TOLERANCE: f64 = 1e-6;

/// Row-major representation used for configuration files and snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceRows {
    pub likes: Vec<Vec<f64>>,
    pub survival: Vec<Vec<f64>>,
    pub prior: Vec<f64>,
}

/// An option/type problem: `likes[i][j]` is the probability that a type-`j` user
/// likes option `i`, `survival[i][j]` the probability the same user stays after
/// disliking it, and `prior[j]` the probability of meeting type `j`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProblemInstance {
    likes: Array2<f64>,
    survival: Array2<f64>,
    prior: Array1<f64>,
}

impl ProblemInstance {
    pub fn new(likes: Array2<f64>, survival: Array2<f64>, prior: Array1<f64>) -> Result<Self> {
        if likes.nrows() == 0 || likes.ncols() == 0 {
            return Err(RecommenderError::EmptyMatrix { what: "likes" });
        }
        if survival.dim() != likes.dim() {
            return Err(RecommenderError::ShapeMismatch {
                what: "survival",
                expected: likes.dim(),
                found: survival.dim(),
            });
        }
        if prior.len() != likes.ncols() {
            return Err(RecommenderError::ShapeMismatch {
                what: "prior",
                expected: (1, likes.ncols()),
                found: (1, prior.len()),
            });
        }

        check_matrix("likes", likes.view())?;
        check_matrix("survival", survival.view())?;
        check_prior(prior.view())?;

        Ok(Self {
            likes,
            survival,
            prior,
        })
    }

    /// Builds an instance from row-major vectors, rejecting ragged rows.
    pub fn from_rows(rows: &InstanceRows) -> Result<Self> {
        let likes = matrix_from_rows("likes", &rows.likes)?;
        let survival = matrix_from_rows("survival", &rows.survival)?;
        Self::new(likes, survival, Array1::from_vec(rows.prior.clone()))
    }

    pub fn to_rows(&self) -> InstanceRows {
        InstanceRows {
            likes: rows_of(&self.likes),
            survival: rows_of(&self.survival),
            prior: self.prior.to_vec(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.to_rows())
    }

    pub fn likes(&self) -> &Array2<f64> {
        &self.likes
    }

    pub fn survival(&self) -> &Array2<f64> {
        &self.survival
    }

    pub fn prior(&self) -> &Array1<f64> {
        &self.prior
    }

    pub fn option_count(&self) -> usize {
        self.likes.nrows()
    }

    pub fn type_count(&self) -> usize {
        self.likes.ncols()
    }
}

fn matrix_from_rows(what: &'static str, rows: &[Vec<f64>]) -> Result<Array2<f64>> {
    let Some(first) = rows.first() else {
        return Err(RecommenderError::EmptyMatrix { what });
    };
    let cols = first.len();
    if cols == 0 {
        return Err(RecommenderError::EmptyMatrix { what });
    }
    for row in rows {
        if row.len() != cols {
            return Err(RecommenderError::ShapeMismatch {
                what,
                expected: (rows.len(), cols),
                found: (rows.len(), row.len()),
            });
        }
    }

    let flat: Vec<f64> = rows.iter().flatten().copied().collect();
    Array2::from_shape_vec((rows.len(), cols), flat).map_err(|_| {
        RecommenderError::ShapeMismatch {
            what,
            expected: (rows.len(), cols),
            found: (rows.len(), cols),
        }
    })
}

fn rows_of(matrix: &Array2<f64>) -> Vec<Vec<f64>> {
    matrix.rows().into_iter().map(|row| row.to_vec()).collect()
}

fn check_matrix(what: &'static str, matrix: ArrayView2<'_, f64>) -> Result<()> {
    for ((row, col), &value) in matrix.indexed_iter() {
        if !is_probability(value) {
            return Err(RecommenderError::ProbabilityOutOfRange {
                what,
                row,
                col,
                value,
            });
        }
    }
    Ok(())
}

fn check_prior(prior: ArrayView1<'_, f64>) -> Result<()> {
    for (col, &value) in prior.iter().enumerate() {
        if !is_probability(value) {
            return Err(RecommenderError::ProbabilityOutOfRange {
                what: "prior",
                row: 0,
                col,
                value,
            });
        }
    }
    let sum = prior.sum();
    if (sum - 1.0).abs() > PRIOR_SUM_TOLERANCE {
        return Err(RecommenderError::InvalidDistribution { sum });
    }
    Ok(())
}

fn is_probability(value: f64) -> bool {
    value.is_finite() && (0.0..=1.0).contains(&value)
}
