//! Score normalisation functions.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalisation {
    #[default]
    MinMax,
    Rank,
    Max,
}

pub fn normalise(raw: &[f64], method: Normalisation) -> Vec<f64> {
    match method {
        Normalisation::MinMax => minmax_normalise(raw),
        Normalisation::Rank => rank_normalise(raw),
        Normalisation::Max => max_normalise(raw),
    }
}

/// Rank-based normalisation: assign rank r in [1, N] (highest score = N),
/// then n = r/N. Handles ties by averaging ranks.
/// Returns normalised scores in the same order as input.
pub fn rank_normalise(raw_scores: &[f64]) -> Vec<f64> {
    let n = raw_scores.len();
    if n == 0 {
        return vec![];
    }

    let mut indexed: Vec<(usize, f64)> = raw_scores.iter().copied().enumerate().collect();
    indexed.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));

    let mut ranks = vec![0.0f64; n];
    let mut i = 0;
    while i < n {
        let mut j = i;
        // Find group of equal scores
        while j < n - 1 && (indexed[j].1 - indexed[j + 1].1).abs() < 1e-10 {
            j += 1;
        }
        let avg_rank = (i + 1 + j + 1) as f64 / 2.0;
        for item in &indexed[i..=j] {
            ranks[item.0] = avg_rank;
        }
        i = j + 1;
    }

    ranks.iter().map(|&r| r / n as f64).collect()
}

/// Min-max normalisation over the slice. A degenerate range falls back to
/// [`max_normalise`], so equal positive scores all map to 1.
pub fn minmax_normalise(raw_scores: &[f64]) -> Vec<f64> {
    let (min, max) = bounds(raw_scores);
    if (max - min).abs() < 1e-12 {
        return max_normalise(raw_scores);
    }
    raw_scores
        .iter()
        .map(|v| ((v - min) / (max - min)).clamp(0.0, 1.0))
        .collect()
}

/// Divide by the maximum; all zeros when the maximum is not positive.
pub fn max_normalise(raw_scores: &[f64]) -> Vec<f64> {
    let (_, max) = bounds(raw_scores);
    if !(max > 0.0) {
        return vec![0.0; raw_scores.len()];
    }
    raw_scores.iter().map(|v| (v / max).clamp(0.0, 1.0)).collect()
}

fn bounds(xs: &[f64]) -> (f64, f64) {
    xs.iter()
        .filter(|x| x.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| (lo.min(x), hi.max(x)))
}
