//! Macro-averaged rank-based evaluation.
//!
//! Micro averages let grouping keys with many true answers dominate: a
//! (relation, tail) pair with 100 true heads contributes 100 observations to
//! head prediction, a pair with one true head contributes one. Macro
//! averaging weights each observation by `1 / count(key)`, so every distinct
//! key carries the same total mass.
//!
//! Harmonic-mean based statistics (MRR) and the median absolute deviation are
//! reported as `NaN`; see [`crate::weighted`].

use std::collections::HashMap;

use ndarray::{ArrayView1, ArrayView2};
use tracing::debug;

use super::accumulator::{hits_fraction, RankAccumulator};
use super::{Evaluator, EvaluatorConfig, MetricResults};
use crate::error::{Error, Result};
use crate::filter::MappedTriple;
use crate::key::{RankType, Side, Target};
use crate::ranks::{batch_ranks, Ranks};
use crate::weighted;

/// Rank-based evaluator with per-key macro averaging.
#[derive(Debug, Clone, Default)]
pub struct MacroRankBasedEvaluator {
    config: EvaluatorConfig,
    accumulator: RankAccumulator,
    /// One key per buffered rank, index-aligned with the rank buffers.
    keys: [Vec<(usize, usize)>; 2],
}

impl MacroRankBasedEvaluator {
    /// Create an evaluator, validating the hits@k cutoffs.
    pub fn new(config: EvaluatorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::default()
        })
    }

    /// Append precomputed ranks together with their grouping keys.
    pub fn process_ranks(
        &mut self,
        batch: &[MappedTriple],
        target: Target,
        ranks: &[Ranks],
        num_candidates: usize,
    ) -> Result<()> {
        if batch.len() != ranks.len() {
            return Err(Error::Shape(format!(
                "{} triples for {} ranks",
                batch.len(),
                ranks.len()
            )));
        }
        self.accumulator.push_batch(target, ranks, num_candidates);
        self.keys[target.index()].extend(batch.iter().map(|triple| triple.key(target)));
        Ok(())
    }

    /// Keys for `side`, head first, in the same order as the rank buffers.
    ///
    /// Keys are compared by value only, so on `both` a head key `(r, t)` and
    /// a tail key `(h, r)` holding the same ids fall into one group.
    fn keys(&self, side: Side) -> Vec<(usize, usize)> {
        side.targets()
            .iter()
            .flat_map(|&target| self.keys[target.index()].iter().copied())
            .collect()
    }
}

/// `1 / count(key)` for every observation.
pub(crate) fn key_weights<K: std::hash::Hash + Eq>(keys: &[K]) -> Vec<f64> {
    let mut counts: HashMap<&K, usize> = HashMap::new();
    for key in keys {
        *counts.entry(key).or_insert(0) += 1;
    }
    keys.iter().map(|key| 1.0 / counts[key] as f64).collect()
}

impl Evaluator for MacroRankBasedEvaluator {
    fn process_scores(
        &mut self,
        batch: &[MappedTriple],
        target: Target,
        scores: ArrayView2<'_, f64>,
        true_scores: Option<ArrayView1<'_, f64>>,
    ) -> Result<()> {
        let true_scores = true_scores
            .ok_or_else(|| Error::MissingInput("MacroRankBasedEvaluator needs the true scores".to_string()))?;
        let ranks = batch_ranks(true_scores, scores)?;
        self.process_ranks(batch, target, &ranks, scores.ncols())
    }

    fn finalize(&mut self) -> Result<MetricResults> {
        let num_candidates = self.accumulator.num_candidates()?;
        let mut results = MetricResults::default();

        for side in Side::ALL {
            let weights = key_weights(&self.keys(side));

            for rank_type in RankType::BASE {
                let ranks = self.accumulator.ranks(side, rank_type);
                if ranks.is_empty() {
                    continue;
                }
                if ranks.len() != weights.len() {
                    return Err(Error::State(format!(
                        "{} ranks but {} grouping keys for {side}.{rank_type}",
                        ranks.len(),
                        weights.len()
                    )));
                }

                let hits = self
                    .config
                    .ks
                    .iter()
                    .map(|&k| (k, hits_fraction(&ranks, k.threshold(num_candidates), Some(&weights))))
                    .collect();
                results.insert_hits(side, rank_type, hits);

                for (metric, value) in weighted::get_macro_ranking_metrics(&ranks, &weights) {
                    results.insert(metric, side, rank_type, value);
                }
            }
        }

        debug!(
            "Finalized {} macro-weighted observations over {} candidates",
            self.accumulator.num_observations(),
            num_candidates
        );
        self.accumulator.clear();
        for keys in &mut self.keys {
            keys.clear();
        }
        Ok(results)
    }

    fn config(&self) -> &EvaluatorConfig {
        &self.config
    }
}
