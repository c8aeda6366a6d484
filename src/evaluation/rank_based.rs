//! Micro-averaged rank-based evaluation.
//!
//! Every observation counts once: the ranks of all evaluated triples are
//! pooled per side and rank type, then reduced by the functions in
//! [`metrics::RANKING_FUNCTIONS`]. Relative hits@k cutoffs are resolved
//! against the candidate count of the most recent batch.

use ndarray::{ArrayView1, ArrayView2};
use tracing::debug;

use super::accumulator::{hits_fraction, RankAccumulator};
use super::{Evaluator, EvaluatorConfig, MetricResults};
use crate::error::{Error, Result};
use crate::filter::MappedTriple;
use crate::key::{RankType, Side, Target};
use crate::metrics::{self, RankMetric};
use crate::ranks::{batch_ranks, Ranks};

/// Micro-averaged rank-based evaluator.
///
/// Computes, per side and rank type:
///
/// - every reduction in [`metrics::RANKING_FUNCTIONS`] (MR, MRR, ...)
/// - hits@k for every configured k
/// - for realistic ranks, the adjusted mean rank (AMR) with range (0, 2) and
///   its index (AMRI) with range [-1, 1], relative to the expected rank under
///   random ordering
///
/// # Example
///
/// ```rust,ignore
/// use lattix_eval::{Evaluator, RankBasedEvaluator, Target};
///
/// let mut evaluator = RankBasedEvaluator::default();
/// evaluator.process_scores(&batch, Target::Tail, scores.view(), Some(true_scores.view()))?;
/// let results = evaluator.finalize()?;
/// println!("{}", results.summary());
/// ```
#[derive(Debug, Clone)]
pub struct RankBasedEvaluator {
    config: EvaluatorConfig,
    accumulator: RankAccumulator,
}

impl RankBasedEvaluator {
    /// Create an evaluator, validating the hits@k cutoffs.
    pub fn new(config: EvaluatorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            accumulator: RankAccumulator::default(),
        })
    }

    /// Append precomputed ranks of one rank type.
    ///
    /// `num_candidates` is the candidate count the ranks were computed
    /// against; relative hits@k thresholds are derived from the last one seen.
    pub fn ingest(&mut self, target: Target, rank_type: RankType, ranks: &[f64], num_candidates: usize) {
        self.accumulator.extend(target, rank_type, ranks, num_candidates);
    }

    /// Append the ranks of one batch under every rank type.
    pub fn process_ranks(&mut self, target: Target, ranks: &[Ranks], num_candidates: usize) {
        self.accumulator.push_batch(target, ranks, num_candidates);
    }

    /// Number of buffered observations for `target` and `rank_type`.
    pub fn num_ranks(&self, target: Target, rank_type: RankType) -> usize {
        self.accumulator.len(target, rank_type)
    }

    pub(crate) fn set_num_candidates(&mut self, num_candidates: usize) {
        self.accumulator.set_num_candidates(num_candidates);
    }
}

impl Default for RankBasedEvaluator {
    fn default() -> Self {
        Self {
            config: EvaluatorConfig::default(),
            accumulator: RankAccumulator::default(),
        }
    }
}

impl Evaluator for RankBasedEvaluator {
    fn process_scores(
        &mut self,
        batch: &[MappedTriple],
        target: Target,
        scores: ArrayView2<'_, f64>,
        true_scores: Option<ArrayView1<'_, f64>>,
    ) -> Result<()> {
        let true_scores = true_scores
            .ok_or_else(|| Error::MissingInput("RankBasedEvaluator needs the true scores".to_string()))?;
        if batch.len() != scores.nrows() {
            return Err(Error::Shape(format!(
                "{} triples for a score matrix with {} rows",
                batch.len(),
                scores.nrows()
            )));
        }
        let ranks = batch_ranks(true_scores, scores)?;
        self.accumulator.push_batch(target, &ranks, scores.ncols());
        Ok(())
    }

    fn finalize(&mut self) -> Result<MetricResults> {
        let num_candidates = self.accumulator.num_candidates()?;
        let mut results = MetricResults::default();

        for side in Side::ALL {
            for rank_type in RankType::BASE {
                let ranks = self.accumulator.ranks(side, rank_type);
                if ranks.is_empty() {
                    continue;
                }

                let hits = self
                    .config
                    .ks
                    .iter()
                    .map(|&k| (k, hits_fraction(&ranks, k.threshold(num_candidates), None)))
                    .collect();
                results.insert_hits(side, rank_type, hits);

                let values = metrics::get_ranking_metrics(&ranks);
                for (&metric, &value) in &values {
                    results.insert(metric, side, rank_type, value);
                }

                let Some(expected_type) = rank_type.expected() else {
                    continue;
                };
                let expected = self.accumulator.ranks(side, expected_type);
                if expected.is_empty() {
                    continue;
                }
                let expected_mean = metrics::mean(&expected);
                let mean_rank = values[&RankMetric::ArithmeticMeanRank];
                results.insert(
                    RankMetric::AdjustedArithmeticMeanRank,
                    side,
                    rank_type,
                    mean_rank / expected_mean,
                );
                results.insert(
                    RankMetric::AdjustedArithmeticMeanRankIndex,
                    side,
                    rank_type,
                    1.0 - (mean_rank - 1.0) / (expected_mean - 1.0),
                );
            }
        }

        debug!(
            "Finalized {} observations over {} candidates",
            self.accumulator.num_observations(),
            num_candidates
        );
        self.accumulator.clear();
        Ok(results)
    }

    fn config(&self) -> &EvaluatorConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::HitsK;
    use ndarray::array;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_finalize_basic() {
        let config = EvaluatorConfig::default().with_ks([HitsK::Absolute(3)]);
        let mut evaluator = RankBasedEvaluator::new(config).unwrap();
        evaluator.ingest(Target::Head, RankType::Realistic, &[1.0, 2.0, 3.0, 4.0, 5.0], 100);
        let results = evaluator.finalize().unwrap();

        assert!(approx(results.get_metric("mr").unwrap(), 3.0));
        assert!(approx(results.get_metric("rank_count.head").unwrap(), 5.0));
        assert!(approx(results.get_metric("hits@3.head").unwrap(), 0.6));
        // Tail was never observed, both equals head.
        assert!(results.get_metric("mr.tail").is_err());
        assert!(approx(results.get_metric("mr.both").unwrap(), 3.0));
        // No optimistic observations at all.
        assert!(results.get_metric("mr.head.optimistic").is_err());
    }

    #[test]
    fn test_adjusted_mean_rank() {
        let mut evaluator = RankBasedEvaluator::default();
        evaluator.ingest(Target::Tail, RankType::Realistic, &[1.0, 3.0], 10);
        evaluator.ingest(Target::Tail, RankType::ExpectedRealistic, &[4.0, 4.0], 10);
        let results = evaluator.finalize().unwrap();

        assert!(approx(results.get_metric("amr.tail").unwrap(), 0.5));
        assert!(approx(results.get_metric("amri.tail").unwrap(), 1.0 - 1.0 / 3.0));
        assert!(approx(results.get_metric("amri").unwrap(), 1.0 - 1.0 / 3.0));
    }

    #[test]
    fn test_finalize_without_batches() {
        let mut evaluator = RankBasedEvaluator::default();
        assert!(matches!(evaluator.finalize(), Err(Error::State(_))));
    }

    #[test]
    fn test_finalize_clears_buffers() {
        let mut evaluator = RankBasedEvaluator::default();
        evaluator.ingest(Target::Head, RankType::Optimistic, &[1.0, 2.0], 5);
        evaluator.finalize().unwrap();
        assert_eq!(evaluator.num_ranks(Target::Head, RankType::Optimistic), 0);
        assert!(matches!(evaluator.finalize(), Err(Error::State(_))));
    }

    #[test]
    fn test_missing_true_scores() {
        let mut evaluator = RankBasedEvaluator::default();
        let batch = [MappedTriple::new(0, 0, 1)];
        let scores = array![[0.1, 0.9, 0.3]];
        let err = evaluator.process_scores(&batch, Target::Tail, scores.view(), None);
        assert!(matches!(err, Err(Error::MissingInput(_))));
    }

    #[test]
    fn test_process_scores() {
        let mut evaluator = RankBasedEvaluator::new(
            EvaluatorConfig::default().with_ks([HitsK::Absolute(1), HitsK::Relative(0.5)]),
        )
        .unwrap();
        let batch = [MappedTriple::new(0, 0, 1), MappedTriple::new(0, 0, 2)];
        let scores = array![[0.1, 0.9, 0.3, 0.0], [0.1, 0.9, 0.3, 0.0]];
        let true_scores = array![0.9, 0.3];
        evaluator
            .process_scores(&batch, Target::Tail, scores.view(), Some(true_scores.view()))
            .unwrap();
        let results = evaluator.finalize().unwrap();

        // Ranks 1 and 2; relative k = floor(4 * 0.5) = 2.
        assert!(approx(results.get_metric("mr.tail").unwrap(), 1.5));
        assert!(approx(results.get_metric("hits@1.tail").unwrap(), 0.5));
        assert_eq!(
            results.hits_at(HitsK::Relative(0.5), Side::Tail, RankType::Realistic),
            Some(1.0)
        );
        // Expected rank (4 + 1) / 2 = 2.5; AMR = 1.5 / 2.5.
        assert!(approx(results.get_metric("amr.tail").unwrap(), 0.6));
    }

    #[test]
    fn test_invalid_relative_k() {
        let config = EvaluatorConfig::default().with_ks([HitsK::Relative(1.5)]);
        assert!(RankBasedEvaluator::new(config).is_err());
    }
}
