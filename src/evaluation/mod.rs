//! Rank-based evaluation for knowledge graph embeddings.
//!
//! This module implements the standard KGE evaluation protocol used in
//! link prediction benchmarks (FB15k-237, WN18RR, etc.).
//!
//! # The Link Prediction Task
//!
//! Given a test triple (h, r, t), we evaluate by:
//! 1. **Tail prediction**: Score all (h, r, ?) candidates, rank true tail
//! 2. **Head prediction**: Score all (?, r, t) candidates, rank true head
//!
//! # Evaluators
//!
//! | Evaluator | Averaging | Candidates |
//! |-----------|-----------|------------|
//! | [`RankBasedEvaluator`] | micro: every observation counts once | all entities |
//! | [`MacroRankBasedEvaluator`] | macro: every grouping key counts once | all entities |
//! | [`SampledRankBasedEvaluator`] | micro | true answer + sampled negatives |
//!
//! All of them implement [`Evaluator`]: score batches go in through
//! [`Evaluator::process_scores`], and [`Evaluator::finalize`] reduces the
//! buffered ranks into [`MetricResults`] and clears the buffers.
//!
//! An evaluator is driven by one thread at a time; callers that score batches
//! in parallel must serialize the calls to `process_scores`.
//!
//! # References
//!
//! - Bordes et al. (2013): Original TransE evaluation
//! - Ali et al. (2020): "Bringing Light Into the Dark" (PyKEEN framework)
//! - Teru et al. (2020): sampled evaluation for inductive link prediction

mod accumulator;
mod macro_avg;
mod rank_based;
mod results;
mod sampled;

pub use macro_avg::MacroRankBasedEvaluator;
pub use rank_based::RankBasedEvaluator;
pub use results::{MetricResults, MetricRow};
pub use sampled::{SampledOptions, SampledRankBasedEvaluator};

use std::fmt;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};
use crate::filter::{KnownTriples, MappedTriple};
use crate::key::Target;

/// Cutoff for hits@k.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HitsK {
    /// Absolute rank cutoff.
    Absolute(usize),
    /// Fraction of the candidate count, in (0, 1).
    Relative(f64),
}

impl HitsK {
    /// Rank threshold for a candidate set of size `num_candidates`.
    pub fn threshold(self, num_candidates: usize) -> f64 {
        match self {
            Self::Absolute(k) => k as f64,
            Self::Relative(fraction) => (num_candidates as f64 * fraction).floor(),
        }
    }

    /// Relative cutoffs must lie strictly between 0 and 1.
    pub fn validate(self) -> Result<()> {
        match self {
            Self::Relative(fraction) if !(fraction > 0.0 && fraction < 1.0) => Err(Error::InvalidK(format!(
                "relative k must be in (0, 1), found {fraction}"
            ))),
            _ => Ok(()),
        }
    }
}

impl From<usize> for HitsK {
    fn from(k: usize) -> Self {
        Self::Absolute(k)
    }
}

impl fmt::Display for HitsK {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absolute(k) => write!(f, "{k}"),
            Self::Relative(fraction) => write!(f, "{fraction}"),
        }
    }
}

/// Evaluation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluatorConfig {
    /// Cutoffs for hits@k (default: 1, 3, 5, 10).
    pub ks: Vec<HitsK>,
    /// Use the filtered ranking protocol (default: true).
    pub filtered: bool,
    /// Triples per scoring batch in [`evaluate`] (default: 256).
    pub batch_size: usize,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            ks: [1, 3, 5, 10].into_iter().map(HitsK::Absolute).collect(),
            filtered: true,
            batch_size: 256,
        }
    }
}

impl EvaluatorConfig {
    pub fn with_ks(mut self, ks: impl IntoIterator<Item = HitsK>) -> Self {
        self.ks = ks.into_iter().collect();
        self
    }

    pub fn with_filtered(mut self, filtered: bool) -> Self {
        self.filtered = filtered;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Reject relative cutoffs outside (0, 1) and a zero batch size.
    pub fn validate(&self) -> Result<()> {
        for k in &self.ks {
            k.validate()?;
        }
        if self.batch_size == 0 {
            return Err(Error::Validation("batch_size must be positive".to_string()));
        }
        Ok(())
    }
}

/// Consumer of score batches that produces rank-based metrics.
pub trait Evaluator {
    /// Ingest one batch of scores.
    ///
    /// `scores` has shape `(batch.len(), num_candidates)` and contains the
    /// true answer's score; `true_scores` has shape `(batch.len(),)`. Filtered
    /// candidates are `NaN`.
    ///
    /// # Errors
    /// [`Error::MissingInput`] if `true_scores` is `None`.
    fn process_scores(
        &mut self,
        batch: &[MappedTriple],
        target: Target,
        scores: ArrayView2<'_, f64>,
        true_scores: Option<ArrayView1<'_, f64>>,
    ) -> Result<()>;

    /// Reduce everything ingested so far and clear the buffers.
    ///
    /// # Errors
    /// [`Error::State`] if no batch has been processed.
    fn finalize(&mut self) -> Result<MetricResults>;

    /// The configuration this evaluator was built with.
    fn config(&self) -> &EvaluatorConfig;
}

/// Produces scores for every candidate entity of a partial triple.
pub trait Scorer {
    /// Number of candidate entities.
    fn num_entities(&self) -> usize;

    /// Scores of all entities at the `target` position of each triple.
    ///
    /// Returns shape `(batch.len(), num_entities)`; higher is more plausible.
    fn score_all(&self, batch: &[MappedTriple], target: Target) -> Result<Array2<f64>>;
}

/// Evaluate `triples` with `scorer`, feeding both targets to `evaluator`.
///
/// With `config().filtered`, every other known answer (from `triples` and
/// `additional_filter_triples`) is masked before ranking.
pub fn evaluate<E, S>(
    evaluator: &mut E,
    scorer: &S,
    triples: &[MappedTriple],
    additional_filter_triples: &[MappedTriple],
) -> Result<MetricResults>
where
    E: Evaluator + ?Sized,
    S: Scorer + ?Sized,
{
    let config = evaluator.config().clone();
    config.validate()?;

    let filter = config
        .filtered
        .then(|| KnownTriples::from_triples(triples.iter().chain(additional_filter_triples)));
    info!(
        "Evaluating {} triples in batches of {} (filtered: {})",
        triples.len(),
        config.batch_size,
        config.filtered
    );

    let num_entities = scorer.num_entities();
    for chunk in triples.chunks(config.batch_size) {
        for target in Target::ALL {
            let mut scores = scorer.score_all(chunk, target)?;
            if scores.dim() != (chunk.len(), num_entities) {
                return Err(Error::Shape(format!(
                    "scorer returned {:?}, expected ({}, {num_entities})",
                    scores.dim(),
                    chunk.len()
                )));
            }

            let true_scores = chunk
                .iter()
                .enumerate()
                .map(|(i, triple)| {
                    let entity = triple.entity(target);
                    scores.get([i, entity]).copied().ok_or_else(|| {
                        Error::Shape(format!("entity {entity} outside of {num_entities} candidates"))
                    })
                })
                .collect::<Result<Array1<f64>>>()?;

            if let Some(known) = &filter {
                known.filter_scores(chunk, target, scores.view_mut())?;
            }
            evaluator.process_scores(chunk, target, scores.view(), Some(true_scores.view()))?;
        }
    }

    evaluator.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EvaluatorConfig::default();
        assert_eq!(config.ks.len(), 4);
        assert!(config.filtered);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_relative_k_validation() {
        assert!(HitsK::Relative(0.1).validate().is_ok());
        for bad in [0.0, 1.0, 1.5, -0.2] {
            assert!(matches!(HitsK::Relative(bad).validate(), Err(Error::InvalidK(_))));
        }
        let config = EvaluatorConfig::default().with_ks([HitsK::Relative(2.0)]);
        assert!(config.validate().is_err());
        assert!(EvaluatorConfig::default().with_batch_size(0).validate().is_err());
    }

    #[test]
    fn test_thresholds() {
        assert_eq!(HitsK::Absolute(3).threshold(1000), 3.0);
        assert_eq!(HitsK::Relative(0.25).threshold(10), 2.0);
        assert_eq!(HitsK::from(5).to_string(), "5");
        assert_eq!(HitsK::Relative(0.5).to_string(), "0.5");
    }

    #[test]
    fn test_config_serde() {
        let config = EvaluatorConfig::default().with_ks([HitsK::Absolute(1), HitsK::Relative(0.1)]);
        let json = serde_json::to_string(&config).unwrap();
        let back: EvaluatorConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
