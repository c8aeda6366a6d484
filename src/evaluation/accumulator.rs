//! Rank buffers shared by all evaluators.

use crate::error::{Error, Result};
use crate::key::{RankType, Side, Target};
use crate::ranks::Ranks;

const NUM_SLOTS: usize = Target::ALL.len() * RankType::ALL.len();

/// Append-only rank buffers, one per (target, rank type) pair.
///
/// `both` is never stored; [`RankAccumulator::ranks`] concatenates head
/// then tail.
#[derive(Debug, Clone, Default)]
pub(crate) struct RankAccumulator {
    buffers: [Vec<f64>; NUM_SLOTS],
    num_candidates: Option<usize>,
}

impl RankAccumulator {
    fn slot(target: Target, rank_type: RankType) -> usize {
        target.index() * RankType::ALL.len() + rank_type.index()
    }

    /// Append the ranks of one batch and remember its candidate count.
    pub fn push_batch(&mut self, target: Target, ranks: &[Ranks], num_candidates: usize) {
        for rank_type in RankType::ALL {
            self.buffers[Self::slot(target, rank_type)].extend(ranks.iter().map(|r| r.get(rank_type)));
        }
        self.num_candidates = Some(num_candidates);
    }

    /// Append raw values for a single rank type.
    pub fn extend(&mut self, target: Target, rank_type: RankType, values: &[f64], num_candidates: usize) {
        self.buffers[Self::slot(target, rank_type)].extend_from_slice(values);
        self.num_candidates = Some(num_candidates);
    }

    pub fn set_num_candidates(&mut self, num_candidates: usize) {
        self.num_candidates = Some(num_candidates);
    }

    /// Candidate count of the most recent batch.
    pub fn num_candidates(&self) -> Result<usize> {
        self.num_candidates.ok_or_else(|| {
            Error::State("finalize called before any batch established the number of candidates".to_string())
        })
    }

    /// Buffered ranks for `side`, head observations first.
    pub fn ranks(&self, side: Side, rank_type: RankType) -> Vec<f64> {
        side.targets()
            .iter()
            .flat_map(|&target| self.buffers[Self::slot(target, rank_type)].iter().copied())
            .collect()
    }

    pub fn len(&self, target: Target, rank_type: RankType) -> usize {
        self.buffers[Self::slot(target, rank_type)].len()
    }

    /// Total buffered observations over base rank types.
    pub fn num_observations(&self) -> usize {
        Target::ALL
            .iter()
            .map(|&target| self.len(target, RankType::Realistic))
            .sum()
    }

    /// Drop all buffered ranks and the candidate count.
    pub fn clear(&mut self) {
        for buffer in &mut self.buffers {
            buffer.clear();
        }
        self.num_candidates = None;
    }
}

/// Fraction of `ranks` at or below `threshold`, optionally weighted.
pub(crate) fn hits_fraction(ranks: &[f64], threshold: f64, weights: Option<&[f64]>) -> f64 {
    let hits: Vec<f64> = ranks.iter().map(|&r| if r <= threshold { 1.0 } else { 0.0 }).collect();
    match weights {
        Some(weights) => crate::weighted::weighted_mean(&hits, weights),
        None => crate::metrics::mean(&hits),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_both_concatenates_head_first() {
        let mut acc = RankAccumulator::default();
        acc.extend(Target::Tail, RankType::Optimistic, &[5.0, 6.0], 10);
        acc.extend(Target::Head, RankType::Optimistic, &[1.0], 10);
        assert_eq!(acc.ranks(Side::Both, RankType::Optimistic), vec![1.0, 5.0, 6.0]);
        assert_eq!(acc.ranks(Side::Head, RankType::Pessimistic), Vec::<f64>::new());
    }

    #[test]
    fn test_clear_resets_state() {
        let mut acc = RankAccumulator::default();
        assert!(matches!(acc.num_candidates(), Err(Error::State(_))));
        acc.extend(Target::Head, RankType::Realistic, &[1.0, 2.0], 3);
        assert_eq!(acc.num_observations(), 2);
        acc.clear();
        assert_eq!(acc.num_observations(), 0);
        assert!(acc.num_candidates().is_err());
    }

    #[test]
    fn test_hits_fraction() {
        let ranks = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert!((hits_fraction(&ranks, 3.0, None) - 0.6).abs() < 1e-12);
        let weights = [0.0, 0.0, 0.0, 1.0, 1.0];
        assert_eq!(hits_fraction(&ranks, 3.0, Some(&weights)), 0.0);
    }
}
