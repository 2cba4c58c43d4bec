//! Pairwise-complete correlation coefficients.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};

use linchpin_common::{LinchpinError, Result};

use crate::descriptive::average_ranks;

/// Fewer complete pairs than this yields a correlation of 0.
pub const MIN_COMPLETE_PAIRS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationMethod {
    Pearson,
    #[default]
    Spearman,
}

pub fn correlate(method: CorrelationMethod, x: &[f64], y: &[f64]) -> f64 {
    match method {
        CorrelationMethod::Pearson => pearson(x, y),
        CorrelationMethod::Spearman => spearman(x, y),
    }
}

pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let (xs, ys) = complete_pairs(x, y);
    pearson_complete(&xs, &ys)
}

/// Spearman's rho: Pearson on average ranks of the complete pairs.
pub fn spearman(x: &[f64], y: &[f64]) -> f64 {
    let (xs, ys) = complete_pairs(x, y);
    if xs.len() < MIN_COMPLETE_PAIRS {
        return 0.0;
    }
    let (rx, _) = average_ranks(&xs);
    let (ry, _) = average_ranks(&ys);
    pearson_complete(&rx, &ry)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrelationTest {
    pub coefficient: f64,
    /// Complete pairs used.
    pub n: usize,
    /// Two-sided, from t = r·sqrt((n − 2) / (1 − r²)) on n − 2 df.
    pub p_value: f64,
}

/// Coefficient plus its significance. `None` with fewer than
/// [`MIN_COMPLETE_PAIRS`] complete pairs or when either side is constant.
pub fn correlation_test(method: CorrelationMethod, x: &[f64], y: &[f64]) -> Result<Option<CorrelationTest>> {
    let (xs, ys) = complete_pairs(x, y);
    let n = xs.len();
    if n < MIN_COMPLETE_PAIRS {
        return Ok(None);
    }
    let r = match method {
        CorrelationMethod::Pearson => pearson_complete(&xs, &ys),
        CorrelationMethod::Spearman => {
            let (rx, _) = average_ranks(&xs);
            let (ry, _) = average_ranks(&ys);
            pearson_complete(&rx, &ry)
        }
    };
    let spread = |v: &[f64]| v.iter().any(|a| *a != v[0]);
    if !spread(&xs) || !spread(&ys) {
        return Ok(None);
    }
    let df = (n - 2) as f64;
    let p_value = if r.abs() >= 1.0 {
        0.0
    } else {
        let t = r * (df / (1.0 - r * r)).sqrt();
        let dist = StudentsT::new(0.0, 1.0, df)
            .map_err(|e| LinchpinError::Computation(format!("student t (df={df}): {e}")))?;
        (2.0 * dist.sf(t.abs())).clamp(0.0, 1.0)
    };
    Ok(Some(CorrelationTest { coefficient: r, n, p_value }))
}

fn complete_pairs(x: &[f64], y: &[f64]) -> (Vec<f64>, Vec<f64>) {
    x.iter()
        .zip(y)
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .map(|(a, b)| (*a, *b))
        .unzip()
}

fn pearson_complete(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len();
    if n < MIN_COMPLETE_PAIRS {
        return 0.0;
    }
    let mx = x.iter().sum::<f64>() / n as f64;
    let my = y.iter().sum::<f64>() / n as f64;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in x.iter().zip(y) {
        let (dx, dy) = (a - mx, b - my);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx <= 0.0 || syy <= 0.0 {
        return 0.0;
    }
    (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pearson_perfect_linear() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [2.0, 4.0, 6.0, 8.0];
        assert!((pearson(&x, &y) - 1.0).abs() < 1e-12);
        let neg: Vec<f64> = y.iter().map(|v| -v).collect();
        assert!((pearson(&x, &neg) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_spearman_monotone_nonlinear() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [1.0, 8.0, 27.0, 64.0, 125.0];
        assert!((spearman(&x, &y) - 1.0).abs() < 1e-12);
        assert!(pearson(&x, &y) < 1.0);
    }

    #[test]
    fn test_degenerate_inputs_give_zero() {
        assert_eq!(pearson(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]), 0.0);
        assert_eq!(spearman(&[1.0, f64::NAN, 3.0], &[1.0, 2.0, f64::NAN]), 0.0);
    }

    #[test]
    fn test_correlation_test_p_values() {
        let x: Vec<f64> = (0..20).map(f64::from).collect();
        let y: Vec<f64> = x.iter().map(|v| v * v).collect();
        let strong = correlation_test(CorrelationMethod::Spearman, &x, &y).unwrap().unwrap();
        assert!((strong.coefficient - 1.0).abs() < 1e-12);
        assert_eq!(strong.p_value, 0.0);
        assert_eq!(strong.n, 20);

        // adjacent swaps: r = 77.5 / 82.5, t about 7.7 on 8 df
        let a = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
        let b = [2.0, 1.0, 4.0, 3.0, 6.0, 5.0, 8.0, 7.0, 10.0, 9.0];
        let t = correlation_test(CorrelationMethod::Pearson, &a, &b).unwrap().unwrap();
        assert!(t.coefficient > 0.9 && t.p_value < 0.001);

        let flat = [1.0; 10];
        assert!(correlation_test(CorrelationMethod::Spearman, &a, &flat).unwrap().is_none());
        assert!(correlation_test(CorrelationMethod::Spearman, &a[..2], &b[..2]).unwrap().is_none());
    }

    #[test]
    fn test_pairwise_complete_drops_missing() {
        let x = [1.0, 2.0, f64::NAN, 4.0, 5.0];
        let y = [2.0, 4.0, 100.0, 8.0, 10.0];
        assert!((pearson(&x, &y) - 1.0).abs() < 1e-12);
    }
}
