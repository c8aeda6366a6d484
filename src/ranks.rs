//! Rank computation from raw scores.
//!
//! Given the score of the true answer and the scores of all candidates
//! (including the true answer itself), the rank depends on how ties are
//! broken:
//!
//! | Rank type | Formula |
//! |-----------|---------|
//! | optimistic | 1 + #{s > true} |
//! | pessimistic | #{s >= true} |
//! | realistic | (optimistic + pessimistic) / 2 |
//! | expected realistic | (#candidates + 1) / 2 |
//!
//! `NaN` scores mark filtered candidates: they never compare greater or equal
//! and are not counted as candidates.

use ndarray::{ArrayView1, ArrayView2, Axis};

use crate::error::{Error, Result};
use crate::key::RankType;

/// Ranks of one example under every rank type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ranks {
    pub optimistic: f64,
    pub pessimistic: f64,
    pub realistic: f64,
    pub expected_realistic: f64,
}

impl Ranks {
    /// Compute ranks of `true_score` among `all_scores`.
    ///
    /// `all_scores` is expected to contain the true score.
    pub fn from_scores(true_score: f64, all_scores: ArrayView1<'_, f64>) -> Self {
        let mut better = 0usize;
        let mut better_or_equal = 0usize;
        let mut candidates = 0usize;
        for &score in all_scores {
            if score.is_nan() {
                continue;
            }
            candidates += 1;
            if score > true_score {
                better += 1;
            }
            if score >= true_score {
                better_or_equal += 1;
            }
        }

        let optimistic = 1.0 + better as f64;
        // The true answer itself is one of the candidates.
        let pessimistic = (better_or_equal as f64).max(optimistic);
        Self {
            optimistic,
            pessimistic,
            realistic: 0.5 * (optimistic + pessimistic),
            expected_realistic: 0.5 * (candidates as f64 + 1.0),
        }
    }

    /// The rank under `rank_type`.
    pub fn get(&self, rank_type: RankType) -> f64 {
        match rank_type {
            RankType::Optimistic => self.optimistic,
            RankType::Pessimistic => self.pessimistic,
            RankType::Realistic => self.realistic,
            RankType::ExpectedRealistic => self.expected_realistic,
        }
    }
}

/// Row-wise [`Ranks::from_scores`] for a batch.
///
/// `scores` has shape `(batch, candidates)`, `true_scores` has shape `(batch,)`.
pub fn batch_ranks(true_scores: ArrayView1<'_, f64>, scores: ArrayView2<'_, f64>) -> Result<Vec<Ranks>> {
    if true_scores.len() != scores.nrows() {
        return Err(Error::Shape(format!(
            "{} true scores for a batch of {} rows",
            true_scores.len(),
            scores.nrows()
        )));
    }
    Ok(scores
        .axis_iter(Axis(0))
        .zip(true_scores)
        .map(|(row, &true_score)| Ranks::from_scores(true_score, row))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array1};

    #[test]
    fn test_distinct_scores() {
        let scores = array![0.9, 0.8, 0.7, 0.5, 0.3];

        // Highest score -> rank 1
        let top = Ranks::from_scores(0.9, scores.view());
        assert_eq!(top.optimistic, 1.0);
        assert_eq!(top.pessimistic, 1.0);

        // Lowest -> rank 5
        let bottom = Ranks::from_scores(0.3, scores.view());
        assert_eq!(bottom.realistic, 5.0);
        assert_eq!(bottom.expected_realistic, 3.0);
    }

    #[test]
    fn test_ties() {
        let scores = array![0.9, 0.5, 0.5, 0.5, 0.1];
        let ranks = Ranks::from_scores(0.5, scores.view());
        assert_eq!(ranks.optimistic, 2.0);
        assert_eq!(ranks.pessimistic, 4.0);
        assert_eq!(ranks.realistic, 3.0);
    }

    #[test]
    fn test_filtered_candidates_ignored() {
        let scores = array![f64::NAN, 0.8, f64::NAN, 0.2];
        let ranks = Ranks::from_scores(0.2, scores.view());
        assert_eq!(ranks.optimistic, 2.0);
        assert_eq!(ranks.expected_realistic, 1.5);
    }

    #[test]
    fn test_batch_shape_mismatch() {
        let scores = ndarray::Array2::<f64>::zeros((3, 4));
        let true_scores = Array1::<f64>::zeros(2);
        assert!(matches!(
            batch_ranks(true_scores.view(), scores.view()),
            Err(Error::Shape(_))
        ));
    }
}
