//! Weighted statistics for macro-averaged evaluation.
//!
//! The harmonic mean, its reciprocal (MRR) and the median absolute deviation
//! have no weighted counterpart yet and report `NaN`.

use crate::metrics::RankMetric;

const HALF_TOLERANCE: f64 = 1e-9;

/// Weighted arithmetic mean.
pub fn weighted_mean(values: &[f64], weights: &[f64]) -> f64 {
    let total: f64 = weights.iter().sum();
    values.iter().zip(weights).map(|(v, w)| v * w).sum::<f64>() / total
}

/// Weighted geometric mean, computed in log space.
pub fn weighted_geometric_mean(values: &[f64], weights: &[f64]) -> f64 {
    let logs: Vec<f64> = values.iter().map(|v| v.ln()).collect();
    weighted_mean(&logs, weights).exp()
}

/// Weighted median.
///
/// Sorts values ascending (carrying weights along) and returns the first value
/// whose cumulative weight fraction reaches one half. When the fraction lands
/// exactly on one half, the two straddling values are averaged, so uniform
/// weights reproduce the ordinary median.
///
/// The averaging applies to non-uniform weights as well. Macro weights hit
/// the boundary often: values `[1, 2, 3, 10]` with weights `[1/3, 1/3, 1/3, 1]`
/// reach exactly one half after the third value and give `(3 + 10) / 2`,
/// where stopping at the first crossing would give `3`.
pub fn weighted_median(values: &[f64], weights: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let total: f64 = weights.iter().sum();
    let mut cumulative = 0.0;
    for (position, &i) in order.iter().enumerate() {
        cumulative += weights[i];
        let fraction = cumulative / total;
        if fraction >= 0.5 - HALF_TOLERANCE {
            if (fraction - 0.5).abs() <= HALF_TOLERANCE {
                if let Some(&next) = order.get(position + 1) {
                    return 0.5 * (values[i] + values[next]);
                }
            }
            return values[i];
        }
    }
    values[order[order.len() - 1]]
}

/// Weighted population variance around the weighted mean.
pub fn weighted_variance(values: &[f64], weights: &[f64]) -> f64 {
    let m = weighted_mean(values, weights);
    let squared: Vec<f64> = values.iter().map(|v| (v - m).powi(2)).collect();
    weighted_mean(&squared, weights)
}

/// Weighted analogues of every micro reduction, in reporting order.
///
/// The count is the raw number of observations, not the weight mass.
pub fn get_macro_ranking_metrics(ranks: &[f64], weights: &[f64]) -> Vec<(RankMetric, f64)> {
    let mean = weighted_mean(ranks, weights);
    let geometric = weighted_geometric_mean(ranks, weights);
    let median = weighted_median(ranks, weights);
    let variance = weighted_variance(ranks, weights);

    vec![
        (RankMetric::ArithmeticMeanRank, mean),
        (RankMetric::GeometricMeanRank, geometric),
        (RankMetric::HarmonicMeanRank, f64::NAN),
        (RankMetric::MedianRank, median),
        (RankMetric::InverseArithmeticMeanRank, mean.recip()),
        (RankMetric::InverseGeometricMeanRank, geometric.recip()),
        (RankMetric::InverseHarmonicMeanRank, f64::NAN),
        (RankMetric::InverseMedianRank, median.recip()),
        (RankMetric::RankStd, variance.sqrt()),
        (RankMetric::RankVariance, variance),
        (RankMetric::RankMad, f64::NAN),
        (RankMetric::RankCount, ranks.len() as f64),
    ]
}
