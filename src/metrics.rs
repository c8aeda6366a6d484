//! Rank-based metrics and their reductions.
//!
//! Every metric except the adjusted ones (which need a chance baseline) and
//! hits@k (which needs a cutoff) is a pure reduction over a slice of ranks.
//! The reductions live in a static table, [`RANKING_FUNCTIONS`], so callers can
//! iterate them in a fixed order.
//!
//! | Metric | Alias | Range | Better |
//! |--------|-------|-------|--------|
//! | `arithmetic_mean_rank` | MR | [1, inf) | lower |
//! | `inverse_harmonic_mean_rank` | MRR | (0, 1] | higher |
//! | `adjusted_arithmetic_mean_rank` | AMR | (0, 2) | lower |
//! | `adjusted_arithmetic_mean_rank_index` | AMRI | [-1, 1] | higher |
//! | `hits_at_k` | H@k | [0, 1] | higher |
//!
//! Note that the inverse metrics are reciprocals *of* the mean, so MRR is the
//! reciprocal of the harmonic mean, which equals the mean of reciprocals.
//!
//! # References
//!
//! - Berrendorf et al. (2020). "Interpretable and Fair Comparison of Link
//!   Prediction or Entity Alignment Methods with Adjusted Mean Rank."

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Named rank-based metrics (everything except hits@k).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankMetric {
    /// Mean rank (MR).
    ArithmeticMeanRank,
    /// Geometric mean rank (GMR).
    GeometricMeanRank,
    /// Harmonic mean rank (HMR).
    HarmonicMeanRank,
    /// Median rank.
    MedianRank,
    /// 1 / MR.
    InverseArithmeticMeanRank,
    /// 1 / GMR.
    InverseGeometricMeanRank,
    /// 1 / HMR, i.e. the mean reciprocal rank (MRR).
    InverseHarmonicMeanRank,
    /// 1 / median rank.
    InverseMedianRank,
    /// Population standard deviation of the ranks.
    RankStd,
    /// Population variance of the ranks.
    #[serde(rename = "rank_var")]
    RankVariance,
    /// Median absolute deviation of the ranks.
    RankMad,
    /// Number of ranks.
    RankCount,
    /// MR divided by the expected MR under random ordering (AMR).
    AdjustedArithmeticMeanRank,
    /// AMR re-indexed to [-1, 1], 1 being perfect and 0 random (AMRI).
    AdjustedArithmeticMeanRankIndex,
}

impl RankMetric {
    /// Every metric, in reporting order.
    pub const ALL: [RankMetric; 14] = [
        RankMetric::ArithmeticMeanRank,
        RankMetric::GeometricMeanRank,
        RankMetric::HarmonicMeanRank,
        RankMetric::MedianRank,
        RankMetric::InverseArithmeticMeanRank,
        RankMetric::InverseGeometricMeanRank,
        RankMetric::InverseHarmonicMeanRank,
        RankMetric::InverseMedianRank,
        RankMetric::RankStd,
        RankMetric::RankVariance,
        RankMetric::RankMad,
        RankMetric::RankCount,
        RankMetric::AdjustedArithmeticMeanRank,
        RankMetric::AdjustedArithmeticMeanRankIndex,
    ];

    /// Canonical snake_case name, as used in metric keys.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ArithmeticMeanRank => "arithmetic_mean_rank",
            Self::GeometricMeanRank => "geometric_mean_rank",
            Self::HarmonicMeanRank => "harmonic_mean_rank",
            Self::MedianRank => "median_rank",
            Self::InverseArithmeticMeanRank => "inverse_arithmetic_mean_rank",
            Self::InverseGeometricMeanRank => "inverse_geometric_mean_rank",
            Self::InverseHarmonicMeanRank => "inverse_harmonic_mean_rank",
            Self::InverseMedianRank => "inverse_median_rank",
            Self::RankStd => "rank_std",
            Self::RankVariance => "rank_var",
            Self::RankMad => "rank_mad",
            Self::RankCount => "rank_count",
            Self::AdjustedArithmeticMeanRank => "adjusted_arithmetic_mean_rank",
            Self::AdjustedArithmeticMeanRankIndex => "adjusted_arithmetic_mean_rank_index",
        }
    }

    /// Whether only the realistic rank type is defined for this metric.
    pub fn is_realistic_only(self) -> bool {
        matches!(
            self,
            Self::AdjustedArithmeticMeanRank | Self::AdjustedArithmeticMeanRankIndex
        )
    }

    /// Descriptive metadata for this metric.
    pub fn annotation(self) -> MetricAnnotation {
        let at_least_one = ValueRange::at_least(1.0);
        let unit_interval = ValueRange::new(Some(0.0), Some(1.0), false, true);
        let non_negative = ValueRange::at_least(0.0);
        let pythagorean = "https://cthoyt.com/2021/04/19/pythagorean-mean-ranks.html";
        let reference = "https://pykeen.readthedocs.io/en/stable/reference/evaluation.html";
        let adjusted = "https://arxiv.org/abs/2002.06914";

        let (name, increasing, value_range, description, link) = match self {
            Self::ArithmeticMeanRank => (
                "Mean Rank (MR)",
                false,
                at_least_one,
                "The arithmetic mean over all ranks.",
                "https://pykeen.readthedocs.io/en/stable/tutorial/understanding_evaluation.html#mean-rank",
            ),
            Self::GeometricMeanRank => (
                "Geometric Mean Rank (GMR)",
                false,
                at_least_one,
                "The geometric mean over all ranks.",
                pythagorean,
            ),
            Self::HarmonicMeanRank => (
                "Harmonic Mean Rank (HMR)",
                false,
                at_least_one,
                "The harmonic mean over all ranks.",
                pythagorean,
            ),
            Self::MedianRank => ("Median Rank", false, at_least_one, "The median over all ranks.", pythagorean),
            Self::InverseArithmeticMeanRank => (
                "Inverse Arithmetic Mean Rank (IAMR)",
                true,
                unit_interval,
                "The inverse of the arithmetic mean over all ranks.",
                pythagorean,
            ),
            Self::InverseGeometricMeanRank => (
                "Inverse Geometric Mean Rank (IGMR)",
                true,
                unit_interval,
                "The inverse of the geometric mean over all ranks.",
                pythagorean,
            ),
            Self::InverseHarmonicMeanRank => (
                "Mean Reciprocal Rank (MRR)",
                true,
                unit_interval,
                "The inverse of the harmonic mean over all ranks.",
                "https://en.wikipedia.org/wiki/Mean_reciprocal_rank",
            ),
            Self::InverseMedianRank => (
                "Inverse Median Rank",
                true,
                unit_interval,
                "The inverse of the median over all ranks.",
                pythagorean,
            ),
            Self::RankStd => (
                "Rank Standard Deviation",
                false,
                non_negative,
                "The standard deviation over all ranks.",
                reference,
            ),
            Self::RankVariance => ("Rank Variance", false, non_negative, "The variance over all ranks.", reference),
            Self::RankMad => (
                "Rank Median Absolute Deviation",
                false,
                non_negative,
                "The median absolute deviation over all ranks.",
                reference,
            ),
            Self::RankCount => (
                "Rank Count",
                true,
                at_least_one,
                "The number of considered ranks. Low numbers may indicate unreliable results.",
                reference,
            ),
            Self::AdjustedArithmeticMeanRank => (
                "Adjusted Arithmetic Mean Rank (AAMR)",
                false,
                ValueRange::new(Some(0.0), Some(2.0), false, false),
                "The mean over all chance-adjusted ranks.",
                adjusted,
            ),
            Self::AdjustedArithmeticMeanRankIndex => (
                "Adjusted Arithmetic Mean Rank Index (AAMRI)",
                true,
                ValueRange::new(Some(-1.0), Some(1.0), true, true),
                "The re-indexed adjusted mean rank (AAMR).",
                adjusted,
            ),
        };

        MetricAnnotation {
            name,
            increasing,
            value_range,
            description,
            link,
        }
    }
}

impl fmt::Display for RankMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RankMetric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| Error::UnknownMetric(s.to_string()))
    }
}

/// Annotation for the hits@k family.
pub fn hits_at_k_annotation() -> MetricAnnotation {
    MetricAnnotation {
        name: "Hits @ K",
        increasing: true,
        value_range: ValueRange::new(Some(0.0), Some(1.0), true, true),
        description: "The relative frequency of ranks not larger than a given k.",
        link: "https://pykeen.readthedocs.io/en/stable/tutorial/understanding_evaluation.html#hits-k",
    }
}

/// Interval a metric value can take. `None` bounds are unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ValueRange {
    /// Lower bound, `None` for unbounded.
    pub lower: Option<f64>,
    /// Upper bound, `None` for unbounded.
    pub upper: Option<f64>,
    /// Whether `lower` itself is attainable.
    pub lower_inclusive: bool,
    /// Whether `upper` itself is attainable.
    pub upper_inclusive: bool,
}

impl ValueRange {
    pub fn new(lower: Option<f64>, upper: Option<f64>, lower_inclusive: bool, upper_inclusive: bool) -> Self {
        Self {
            lower,
            upper,
            lower_inclusive,
            upper_inclusive,
        }
    }

    /// `[lower, inf)`.
    pub fn at_least(lower: f64) -> Self {
        Self::new(Some(lower), None, true, false)
    }

    /// Whether `value` lies inside the range.
    pub fn contains(&self, value: f64) -> bool {
        let above = match self.lower {
            Some(lo) if self.lower_inclusive => value >= lo,
            Some(lo) => value > lo,
            None => true,
        };
        let below = match self.upper {
            Some(hi) if self.upper_inclusive => value <= hi,
            Some(hi) => value < hi,
            None => true,
        };
        above && below
    }
}

/// Human-facing description of a metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricAnnotation {
    /// Display name.
    pub name: &'static str,
    /// Whether larger values are better.
    pub increasing: bool,
    /// Values the metric can take.
    pub value_range: ValueRange,
    /// One-line description.
    pub description: &'static str,
    /// Where to read more.
    pub link: &'static str,
}

/// A reduction from a non-empty slice of ranks to a single value.
pub type RankReduction = fn(&[f64]) -> f64;

/// The micro-averaged reductions, applied in this order.
pub static RANKING_FUNCTIONS: [(RankMetric, RankReduction); 12] = [
    (RankMetric::ArithmeticMeanRank, mean),
    (RankMetric::HarmonicMeanRank, harmonic_mean),
    (RankMetric::GeometricMeanRank, geometric_mean),
    (RankMetric::MedianRank, median),
    (RankMetric::InverseArithmeticMeanRank, inverse_mean),
    (RankMetric::InverseGeometricMeanRank, inverse_geometric_mean),
    (RankMetric::InverseHarmonicMeanRank, inverse_harmonic_mean),
    (RankMetric::InverseMedianRank, inverse_median),
    (RankMetric::RankStd, std_dev),
    (RankMetric::RankVariance, variance),
    (RankMetric::RankMad, median_absolute_deviation),
    (RankMetric::RankCount, count),
];

/// Apply every reduction in [`RANKING_FUNCTIONS`] to `ranks`.
///
/// Callers skip empty inputs; the reductions do not special-case them.
pub fn get_ranking_metrics(ranks: &[f64]) -> BTreeMap<RankMetric, f64> {
    RANKING_FUNCTIONS
        .iter()
        .map(|(metric, reduce)| (*metric, reduce(ranks)))
        .collect()
}

/// Arithmetic mean.
pub fn mean(x: &[f64]) -> f64 {
    x.iter().sum::<f64>() / x.len() as f64
}

/// Geometric mean, computed in log space.
pub fn geometric_mean(x: &[f64]) -> f64 {
    (x.iter().map(|v| v.ln()).sum::<f64>() / x.len() as f64).exp()
}

/// Harmonic mean.
pub fn harmonic_mean(x: &[f64]) -> f64 {
    x.len() as f64 / x.iter().map(|v| v.recip()).sum::<f64>()
}

/// Median; the mean of the two middle values for even lengths.
pub fn median(x: &[f64]) -> f64 {
    let mut sorted = x.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len();
    if n == 0 {
        return f64::NAN;
    }
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        0.5 * (sorted[n / 2 - 1] + sorted[n / 2])
    }
}

/// Population variance.
pub fn variance(x: &[f64]) -> f64 {
    let m = mean(x);
    x.iter().map(|v| (v - m).powi(2)).sum::<f64>() / x.len() as f64
}

/// Population standard deviation.
pub fn std_dev(x: &[f64]) -> f64 {
    variance(x).sqrt()
}

fn inverse_mean(x: &[f64]) -> f64 {
    mean(x).recip()
}

fn inverse_geometric_mean(x: &[f64]) -> f64 {
    geometric_mean(x).recip()
}

/// Mean reciprocal rank.
fn inverse_harmonic_mean(x: &[f64]) -> f64 {
    harmonic_mean(x).recip()
}

fn inverse_median(x: &[f64]) -> f64 {
    median(x).recip()
}

fn count(x: &[f64]) -> f64 {
    x.len() as f64
}

/// Median of absolute deviations from the median (unscaled).
pub fn median_absolute_deviation(x: &[f64]) -> f64 {
    let center = median(x);
    let deviations: Vec<f64> = x.iter().map(|v| (v - center).abs()).collect();
    median(&deviations)
}
