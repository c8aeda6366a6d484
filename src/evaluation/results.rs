//! Finalized evaluation results.

use std::collections::BTreeMap;

use serde::Serialize;

use super::HitsK;
use crate::error::{Error, Result};
use crate::key::{MetricKey, RankType, Side, HITS_AT_K};
use crate::metrics::RankMetric;

/// Nested metric values produced by one `finalize`.
///
/// Layout is `metric -> side -> rank_type -> value`, with hits@k stored
/// separately as `side -> rank_type -> k -> value`. `k` is keyed by its
/// display form (`"10"`, `"0.1"`). A (side, rank type) pair without
/// observations has no entry at all.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricResults {
    metrics: BTreeMap<RankMetric, BTreeMap<Side, BTreeMap<RankType, f64>>>,
    hits_at_k: BTreeMap<Side, BTreeMap<RankType, BTreeMap<String, f64>>>,
}

/// One flattened result row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRow {
    pub side: Side,
    pub rank_type: RankType,
    pub metric: String,
    pub value: f64,
}

impl MetricResults {
    pub(crate) fn insert(&mut self, metric: RankMetric, side: Side, rank_type: RankType, value: f64) {
        self.metrics
            .entry(metric)
            .or_default()
            .entry(side)
            .or_default()
            .insert(rank_type, value);
    }

    pub(crate) fn insert_hits(&mut self, side: Side, rank_type: RankType, hits: Vec<(HitsK, f64)>) {
        let by_k = hits.into_iter().map(|(k, value)| (k.to_string(), value)).collect();
        self.hits_at_k.entry(side).or_default().insert(rank_type, by_k);
    }

    /// Value of `metric`, if it was computed.
    pub fn get(&self, metric: RankMetric, side: Side, rank_type: RankType) -> Option<f64> {
        self.metrics.get(&metric)?.get(&side)?.get(&rank_type).copied()
    }

    /// Hits@k value, if it was computed.
    pub fn hits_at(&self, k: HitsK, side: Side, rank_type: RankType) -> Option<f64> {
        self.hits_at_k
            .get(&side)?
            .get(&rank_type)?
            .get(&k.to_string())
            .copied()
    }

    /// Look up a metric by specification, e.g. `"mrr"`, `"hits@10"` or
    /// `"arithmetic_mean_rank.head.optimistic"`.
    ///
    /// # Errors
    /// Grammar errors from [`MetricKey::lookup`], [`Error::UnknownMetric`]
    /// for names without a reduction, and [`Error::NotFound`] when the
    /// combination was never computed.
    pub fn get_metric(&self, spec: &str) -> Result<f64> {
        let key = MetricKey::lookup(spec)?;
        let value = if key.name == HITS_AT_K {
            let k = key.k.ok_or_else(|| Error::InvalidK(format!("missing k in {key}")))?;
            self.hits_at(HitsK::Absolute(k), key.side, key.rank_type)
        } else {
            let metric: RankMetric = key.name.parse()?;
            self.get(metric, key.side, key.rank_type)
        };
        value.ok_or_else(|| Error::NotFound(key.to_string()))
    }

    /// All values as `(side, rank_type, metric, value)` rows.
    pub fn rows(&self) -> Vec<MetricRow> {
        let mut rows = Vec::new();
        for (metric, sides) in &self.metrics {
            for (side, types) in sides {
                for (rank_type, value) in types {
                    rows.push(MetricRow {
                        side: *side,
                        rank_type: *rank_type,
                        metric: metric.to_string(),
                        value: *value,
                    });
                }
            }
        }
        for (side, types) in &self.hits_at_k {
            for (rank_type, hits) in types {
                for (k, value) in hits {
                    rows.push(MetricRow {
                        side: *side,
                        rank_type: *rank_type,
                        metric: format!("hits_at_{k}"),
                        value: *value,
                    });
                }
            }
        }
        rows
    }

    /// All values keyed by `"side.rank_type.metric"`.
    pub fn to_flat_map(&self) -> BTreeMap<String, f64> {
        self.rows()
            .into_iter()
            .map(|row| (format!("{}.{}.{}", row.side, row.rank_type, row.metric), row.value))
            .collect()
    }

    /// Nested JSON rendering. Not-a-number values become `null`.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Whether nothing was computed.
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty() && self.hits_at_k.is_empty()
    }

    /// Format the headline numbers (both sides, realistic) as a summary string.
    pub fn summary(&self) -> String {
        let get = |metric| self.get(metric, Side::Both, RankType::Realistic).unwrap_or(f64::NAN);
        let hits = |k| {
            self.hits_at(HitsK::Absolute(k), Side::Both, RankType::Realistic)
                .unwrap_or(f64::NAN)
        };
        format!(
            "MRR: {:.4} | MR: {:.1} | H@1: {:.3} | H@3: {:.3} | H@10: {:.3} (n={})",
            get(RankMetric::InverseHarmonicMeanRank),
            get(RankMetric::ArithmeticMeanRank),
            hits(1),
            hits(3),
            hits(10),
            get(RankMetric::RankCount)
        )
    }
}
