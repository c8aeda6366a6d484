//! Rank-based evaluation against sampled negatives.
//!
//! Each evaluation triple is ranked against its true answer plus a fixed set
//! of sampled negatives instead of the full entity vocabulary. The resulting
//! metrics are optimistic estimates of the full-vocabulary metrics
//! (cf. <https://arxiv.org/abs/2106.06935>); relative hits@k thresholds still
//! use the full candidate count.

use std::collections::HashMap;

use ndarray::{Array2, ArrayView1, ArrayView2};
use tracing::info;

use super::{Evaluator, EvaluatorConfig, MetricResults, RankBasedEvaluator};
use crate::error::{Error, Result};
use crate::filter::MappedTriple;
use crate::key::Target;
use crate::negatives::{sample_negatives, SampledNegatives};

/// Negatives used when neither a count nor explicit tables are given.
pub const DEFAULT_NUM_NEGATIVES: usize = 50;

/// Where the sampled negatives come from.
#[derive(Debug, Clone)]
pub struct SampledOptions {
    /// Negatives per triple when sampling (default: 50).
    pub num_negatives: Option<usize>,
    /// Explicit head negatives, shape `(num_triples, num_negatives)`.
    pub head_negatives: Option<Array2<usize>>,
    /// Explicit tail negatives, shape `(num_triples, num_negatives)`.
    pub tail_negatives: Option<Array2<usize>>,
    /// Known triples beyond the evaluation set that must not be sampled.
    pub additional_filter_triples: Vec<MappedTriple>,
    /// Random seed (default: 42).
    pub seed: u64,
}

impl Default for SampledOptions {
    fn default() -> Self {
        Self {
            num_negatives: None,
            head_negatives: None,
            tail_negatives: None,
            additional_filter_triples: Vec::new(),
            seed: 42,
        }
    }
}

impl SampledOptions {
    pub fn with_num_negatives(mut self, n: usize) -> Self {
        self.num_negatives = Some(n);
        self
    }

    pub fn with_negatives(mut self, head: Option<Array2<usize>>, tail: Option<Array2<usize>>) -> Self {
        self.head_negatives = head;
        self.tail_negatives = tail;
        self
    }

    pub fn with_additional_filter_triples(mut self, triples: impl IntoIterator<Item = MappedTriple>) -> Self {
        self.additional_filter_triples = triples.into_iter().collect();
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Micro-averaged evaluator ranking against sampled negatives.
#[derive(Debug, Clone)]
pub struct SampledRankBasedEvaluator {
    inner: RankBasedEvaluator,
    negatives: SampledNegatives,
    triple_to_index: HashMap<MappedTriple, usize>,
    num_entities: usize,
}

impl SampledRankBasedEvaluator {
    /// Build an evaluator for a fixed set of evaluation triples.
    ///
    /// Negatives are sampled here unless both tables are supplied.
    ///
    /// # Errors
    /// [`Error::Validation`] if exactly one table is supplied or the sample
    /// count exceeds `num_entities`; [`Error::Shape`] if a table's row count
    /// differs from the number of evaluation triples.
    pub fn new(
        config: EvaluatorConfig,
        evaluation_triples: &[MappedTriple],
        num_entities: usize,
        options: SampledOptions,
    ) -> Result<Self> {
        let inner = RankBasedEvaluator::new(config)?;

        let negatives = match (options.head_negatives, options.tail_negatives) {
            (None, None) => {
                let num_negatives = options.num_negatives.unwrap_or(DEFAULT_NUM_NEGATIVES);
                info!(
                    "Sampling {} negatives for each of the {} evaluation triples.",
                    num_negatives,
                    evaluation_triples.len()
                );
                if num_negatives > num_entities {
                    return Err(Error::Validation(
                        "Cannot use more negative samples than there are entities.".to_string(),
                    ));
                }
                sample_negatives(
                    evaluation_triples,
                    &options.additional_filter_triples,
                    num_negatives,
                    Some(num_entities),
                    options.seed,
                )?
            }
            (Some(head), Some(tail)) => SampledNegatives::new(head, tail),
            _ => {
                return Err(Error::Validation(
                    "Either both, head and tail negatives must be provided, or none.".to_string(),
                ))
            }
        };
        negatives.validate(evaluation_triples.len())?;

        let triple_to_index = evaluation_triples
            .iter()
            .enumerate()
            .map(|(i, &triple)| (triple, i))
            .collect();

        Ok(Self {
            inner,
            negatives,
            triple_to_index,
            num_entities,
        })
    }

    /// The negative tables in use.
    pub fn negatives(&self) -> &SampledNegatives {
        &self.negatives
    }

    pub fn num_entities(&self) -> usize {
        self.num_entities
    }

    /// Replace full scores by `[true score, negative scores...]` per row.
    fn reduce_scores(
        &self,
        batch: &[MappedTriple],
        target: Target,
        scores: ArrayView2<'_, f64>,
        true_scores: ArrayView1<'_, f64>,
    ) -> Result<Array2<f64>> {
        if batch.len() != scores.nrows() || batch.len() != true_scores.len() {
            return Err(Error::Shape(format!(
                "{} triples, {} score rows, {} true scores",
                batch.len(),
                scores.nrows(),
                true_scores.len()
            )));
        }
        let table = self.negatives.get(target);
        let mut reduced = Array2::zeros((batch.len(), table.ncols() + 1));
        for (i, triple) in batch.iter().enumerate() {
            let row = *self
                .triple_to_index
                .get(triple)
                .ok_or_else(|| Error::NotFound(format!("{triple:?} is not an evaluation triple")))?;
            reduced[[i, 0]] = true_scores[i];
            for (j, &entity) in table.row(row).iter().enumerate() {
                reduced[[i, j + 1]] = *scores.get([i, entity]).ok_or_else(|| {
                    Error::Shape(format!(
                        "negative entity {entity} outside of {} candidates",
                        scores.ncols()
                    ))
                })?;
            }
        }
        Ok(reduced)
    }
}

impl Evaluator for SampledRankBasedEvaluator {
    fn process_scores(
        &mut self,
        batch: &[MappedTriple],
        target: Target,
        scores: ArrayView2<'_, f64>,
        true_scores: Option<ArrayView1<'_, f64>>,
    ) -> Result<()> {
        let true_scores = true_scores.ok_or_else(|| {
            Error::MissingInput("SampledRankBasedEvaluator needs the true scores".to_string())
        })?;
        let num_candidates = scores.ncols();
        let reduced = self.reduce_scores(batch, target, scores, true_scores)?;
        self.inner
            .process_scores(batch, target, reduced.view(), Some(true_scores))?;
        // Ranks come from the reduced set; report the real candidate count.
        self.inner.set_num_candidates(num_candidates);
        Ok(())
    }

    fn finalize(&mut self) -> Result<MetricResults> {
        self.inner.finalize()
    }

    fn config(&self) -> &EvaluatorConfig {
        self.inner.config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::HitsK;
    use crate::key::{RankType, Side};
    use ndarray::array;

    fn triples() -> Vec<MappedTriple> {
        vec![MappedTriple::new(0, 0, 1), MappedTriple::new(2, 0, 3)]
    }

    #[test]
    fn test_one_sided_negatives_rejected() {
        let options = SampledOptions::default().with_negatives(Some(Array2::zeros((2, 2))), None);
        let result = SampledRankBasedEvaluator::new(EvaluatorConfig::default(), &triples(), 10, options);
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let options = SampledOptions::default()
            .with_negatives(Some(Array2::zeros((3, 2))), Some(Array2::zeros((2, 2))));
        let result = SampledRankBasedEvaluator::new(EvaluatorConfig::default(), &triples(), 10, options);
        assert!(matches!(result, Err(Error::Shape(_))));
    }

    #[test]
    fn test_too_many_negatives() {
        let options = SampledOptions::default().with_num_negatives(50);
        let result = SampledRankBasedEvaluator::new(EvaluatorConfig::default(), &triples(), 40, options);
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_ranks_against_negatives_only() {
        let head = array![[4, 5], [4, 5]];
        let tail = array![[4, 5], [0, 5]];
        let config = EvaluatorConfig::default().with_ks([HitsK::Absolute(1), HitsK::Relative(0.5)]);
        let mut evaluator = SampledRankBasedEvaluator::new(
            config,
            &triples(),
            6,
            SampledOptions::default().with_negatives(Some(head), Some(tail)),
        )
        .unwrap();

        // Entity 2 outscores the true tail of the first triple, but is not a negative.
        let batch = triples();
        let scores = array![
            [0.0, 0.5, 0.9, 0.0, 0.1, 0.2],
            [0.7, 0.0, 0.0, 0.6, 0.1, 0.2],
        ];
        let true_scores = array![0.5, 0.6];
        evaluator
            .process_scores(&batch, Target::Tail, scores.view(), Some(true_scores.view()))
            .unwrap();
        let results = evaluator.finalize().unwrap();

        // First triple: rank 1 among {0.5, 0.1, 0.2}; second: rank 2 among {0.6, 0.7, 0.2}.
        assert!((results.get_metric("mr.tail").unwrap() - 1.5).abs() < 1e-9);
        // Relative k uses the full 6 candidates: floor(6 * 0.5) = 3.
        assert_eq!(
            results.hits_at(HitsK::Relative(0.5), Side::Tail, RankType::Realistic),
            Some(1.0)
        );
    }

    #[test]
    fn test_unknown_triple() {
        let mut evaluator = SampledRankBasedEvaluator::new(
            EvaluatorConfig::default(),
            &triples(),
            6,
            SampledOptions::default().with_num_negatives(2),
        )
        .unwrap();
        let scores = Array2::zeros((1, 6));
        let true_scores = ndarray::Array1::zeros(1);
        let err = evaluator.process_scores(
            &[MappedTriple::new(5, 5, 5)],
            Target::Head,
            scores.view(),
            Some(true_scores.view()),
        );
        assert!(matches!(err, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_sampled_tables_shape() {
        let evaluator = SampledRankBasedEvaluator::new(
            EvaluatorConfig::default(),
            &triples(),
            8,
            SampledOptions::default().with_num_negatives(3).with_seed(9),
        )
        .unwrap();
        assert_eq!(evaluator.negatives().head.dim(), (2, 3));
        assert_eq!(evaluator.negatives().tail.dim(), (2, 3));
        assert_eq!(evaluator.num_entities(), 8);
    }
}
