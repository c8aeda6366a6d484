//! Rank-based evaluation for link prediction.
//!
//! A link prediction model scores candidate entities for a partial triple
//! `(h, r, ?)` or `(?, r, t)`. Evaluation asks where the true answer lands
//! among the candidates, and summarizes those ranks.
//!
//! ## The Core Pieces
//!
//! | Piece | Role |
//! |-------|------|
//! | [`MetricKey`] | Parses `"mrr"`, `"hits@10.tail"`, ... into canonical keys |
//! | [`metrics`] | Static table of rank reductions (MR, MRR, median, ...) |
//! | [`weighted`] | Weighted statistics for macro averaging |
//! | [`Ranks`] | Optimistic / pessimistic / realistic ranks from scores |
//! | [`RankBasedEvaluator`] | Micro averages over all observations |
//! | [`MacroRankBasedEvaluator`] | Every (relation, entity) key counts once |
//! | [`SampledRankBasedEvaluator`] | Ranks against sampled negatives only |
//! | [`MetricResults`] | Nested results with lookup and flattening |
//!
//! ## Rank Types
//!
//! When the true answer ties with other candidates its rank is ambiguous:
//!
//! ```text
//! scores:  0.9  0.5  0.5* 0.5  0.1      (* = true answer)
//! optimistic  = 2   (ties broken in our favor)
//! pessimistic = 4   (ties broken against us)
//! realistic   = 3   (their mean)
//! ```
//!
//! The realistic rank also has a chance baseline, the expected rank under a
//! random ordering, `(n + 1) / 2`. The adjusted mean rank divides the mean
//! rank by it, which makes results comparable across candidate set sizes.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use lattix_eval::{evaluate, EvaluatorConfig, RankBasedEvaluator};
//!
//! let mut evaluator = RankBasedEvaluator::new(EvaluatorConfig::default())?;
//! let results = evaluate(&mut evaluator, &model, &test_triples, &train_triples)?;
//!
//! println!("{}", results.summary());
//! let mrr = results.get_metric("mrr")?;
//! let h10_tail = results.get_metric("hits@10.tail.realistic")?;
//! ```
//!
//! ## References
//!
//! - Berrendorf et al. (2020). "Interpretable and Fair Comparison of Link
//!   Prediction or Entity Alignment Methods with Adjusted Mean Rank."
//! - Teru et al. (2020). "Inductive Relation Prediction by Subgraph
//!   Reasoning." ICML.

mod error;
pub mod evaluation;
pub mod filter;
pub mod key;
pub mod metrics;
pub mod negatives;
pub mod ranks;
pub mod weighted;

pub use error::{Error, Result};
pub use evaluation::{
    evaluate, Evaluator, EvaluatorConfig, HitsK, MacroRankBasedEvaluator, MetricResults, MetricRow,
    RankBasedEvaluator, SampledOptions, SampledRankBasedEvaluator, Scorer,
};
pub use filter::{KnownTriples, MappedTriple};
pub use key::{MetricKey, RankType, Side, Target};
pub use metrics::{MetricAnnotation, RankMetric, ValueRange};
pub use negatives::{sample_negatives, SampledNegatives};
pub use ranks::Ranks;
