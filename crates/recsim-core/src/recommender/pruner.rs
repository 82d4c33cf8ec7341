//! One-time removal of flat options that another option beats on most types.
//!
//! Only applies when every survival entry is zero: a dislike then always ends
//! the session, so an option with a constant like probability carries no
//! information and is never worth more than an option that exceeds that
//! constant on at least two thirds of the user types.

use ndarray::{ArrayView1, ArrayView2};

/// Original row indices split into survivors and removed rows, both ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PruneOutcome {
    pub kept: Vec<usize>,
    pub removed: Vec<usize>,
}

impl PruneOutcome {
    pub fn keep_all(rows: usize) -> Self {
        Self {
            kept: (0..rows).collect(),
            removed: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
pub struct OptionPruner;

impl OptionPruner {
    /// Prunes `likes` rows when `survival` is entirely zero; otherwise keeps all.
    pub fn prune(likes: ArrayView2<'_, f64>, survival: ArrayView2<'_, f64>) -> PruneOutcome {
        if !survival.iter().all(|v| *v == 0.0) {
            return PruneOutcome::keep_all(likes.nrows());
        }

        let removed = Self::dominated_flat_rows(likes);
        let kept = (0..likes.nrows())
            .filter(|row| !removed.contains(row))
            .collect();
        PruneOutcome { kept, removed }
    }

    /// Flat rows dominated by some other row, judged against the full matrix.
    pub fn dominated_flat_rows(likes: ArrayView2<'_, f64>) -> Vec<usize> {
        let required = dominance_threshold(likes.ncols());
        let mut removed = Vec::new();

        for (i, row) in likes.rows().into_iter().enumerate() {
            let Some(level) = flat_level(row) else {
                continue;
            };
            let dominated = likes
                .rows()
                .into_iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .any(|(_, other)| other.iter().filter(|v| **v > level).count() >= required);
            if dominated {
                removed.push(i);
            }
        }

        removed
    }
}

/// Smallest count of strictly greater entries that makes a row dominant: ⌈2T/3⌉.
pub fn dominance_threshold(type_count: usize) -> usize {
    (2 * type_count).div_ceil(3)
}

fn flat_level(row: ArrayView1<'_, f64>) -> Option<f64> {
    let first = row.iter().next().copied()?;
    row.iter().all(|v| *v == first).then_some(first)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, Axis, array};

    fn zeros_like(likes: &Array2<f64>) -> Array2<f64> {
        Array2::zeros(likes.dim())
    }

    #[test]
    fn threshold_rounds_up() {
        assert_eq!(dominance_threshold(1), 1);
        assert_eq!(dominance_threshold(2), 2);
        assert_eq!(dominance_threshold(3), 2);
        assert_eq!(dominance_threshold(4), 3);
        assert_eq!(dominance_threshold(8), 6);
    }

    #[test]
    fn removes_flat_row_beaten_on_two_thirds() {
        let likes = array![[0.5, 0.5, 0.5], [0.8, 0.2, 0.9], [0.1, 0.2, 0.3]];
        let outcome = OptionPruner::prune(likes.view(), zeros_like(&likes).view());
        assert_eq!(outcome.removed, vec![0]);
        assert_eq!(outcome.kept, vec![1, 2]);
    }

    #[test]
    fn keeps_flat_row_beaten_on_one_third_only() {
        let likes = array![[0.5, 0.5, 0.5], [0.8, 0.2, 0.1]];
        let outcome = OptionPruner::prune(likes.view(), zeros_like(&likes).view());
        assert!(outcome.removed.is_empty());
    }

    #[test]
    fn ties_do_not_count_as_dominance() {
        let likes = array![[0.5, 0.5, 0.5], [0.5, 0.5, 0.9]];
        let outcome = OptionPruner::prune(likes.view(), zeros_like(&likes).view());
        assert!(outcome.removed.is_empty());
    }

    #[test]
    fn nonzero_survival_disables_pruning() {
        let likes = array![[0.5, 0.5, 0.5], [0.8, 0.7, 0.9]];
        let mut survival = zeros_like(&likes);
        survival[[1, 2]] = 0.01;
        let outcome = OptionPruner::prune(likes.view(), survival.view());
        assert_eq!(outcome, PruneOutcome::keep_all(2));
    }

    #[test]
    fn mutually_non_dominating_flat_rows_survive_at_top() {
        // Every row is flat; only the maximal one cannot be beaten.
        let likes = array![[0.3, 0.3], [0.7, 0.7], [0.5, 0.5]];
        let outcome = OptionPruner::prune(likes.view(), zeros_like(&likes).view());
        assert_eq!(outcome.kept, vec![1]);

        let equal = array![[0.4, 0.4], [0.4, 0.4]];
        let outcome = OptionPruner::prune(equal.view(), zeros_like(&equal).view());
        assert_eq!(outcome.kept, vec![0, 1]);
    }

    #[test]
    fn reference_instance_drops_constant_row() {
        let likes = array![
            [0.99, 0.2, 0.2],
            [0.2, 0.99, 0.2],
            [0.2, 0.2, 0.99],
            [0.93, 0.93, 0.4],
            [0.4, 0.93, 0.93],
            [0.93, 0.4, 0.93],
            [0.85, 0.85, 0.85]
        ];
        let outcome = OptionPruner::prune(likes.view(), zeros_like(&likes).view());
        assert_eq!(outcome.removed, vec![6]);
    }

    #[test]
    fn pruning_is_idempotent() {
        let likes = array![
            [0.6, 0.6, 0.6],
            [0.7, 0.1, 0.8],
            [0.4, 0.4, 0.4],
            [0.65, 0.65, 0.65]
        ];
        let first = OptionPruner::prune(likes.view(), zeros_like(&likes).view());
        let pruned = likes.select(Axis(0), &first.kept);
        let second = OptionPruner::prune(pruned.view(), zeros_like(&pruned).view());
        assert!(second.removed.is_empty());
        assert_eq!(second.kept.len(), first.kept.len());
    }

    #[test]
    fn removes_exactly_each_single_qualifying_row() {
        let base = array![[0.9, 0.1, 0.8], [0.2, 0.3, 0.1]];
        for level in [0.05, 0.5] {
            let mut rows = base.clone();
            rows.push_row(array![level, level, level].view()).unwrap();
            let outcome = OptionPruner::prune(rows.view(), zeros_like(&rows).view());
            assert_eq!(outcome.removed, vec![2], "level {level}");
            assert_eq!(outcome.kept, vec![0, 1]);
        }
    }
}
