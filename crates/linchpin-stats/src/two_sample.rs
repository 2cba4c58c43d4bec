//! Two-sample location tests: Welch's t and Mann–Whitney U.

use linchpin_common::{LinchpinError, Result};
use statrs::distribution::{ContinuousCDF, Normal, StudentsT};

use crate::descriptive::{average_ranks, mean, variance};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TestOutcome {
    pub statistic: f64,
    pub p_value: f64,
}

/// Welch's unequal-variance t-test, two-sided.
///
/// Returns `Ok(None)` when the pooled standard error is zero; the caller
/// decides whether that means "no difference" or needs a rank test.
pub fn welch_t_test(a: &[f64], b: &[f64]) -> Result<Option<TestOutcome>> {
    if a.len() < 2 || b.len() < 2 {
        return Err(LinchpinError::Computation(format!(
            "welch t-test needs 2 observations per group, got {} and {}",
            a.len(),
            b.len()
        )));
    }
    let (na, nb) = (a.len() as f64, b.len() as f64);
    let sa = variance(a) / na;
    let sb = variance(b) / nb;
    let se2 = sa + sb;
    let (ma, mb) = (mean(a), mean(b));
    // Rounding noise of constant groups counts as zero spread.
    let floor = (1e-10 * ma.abs().max(mb.abs()).max(1.0)).powi(2);
    if se2 <= floor || !se2.is_finite() {
        return Ok(None);
    }

    let t = (ma - mb) / se2.sqrt();
    let df = se2 * se2 / (sa * sa / (na - 1.0) + sb * sb / (nb - 1.0));
    let dist = StudentsT::new(0.0, 1.0, df)
        .map_err(|e| LinchpinError::Computation(format!("student t (df={df}): {e}")))?;
    let p = (2.0 * dist.sf(t.abs())).clamp(0.0, 1.0);
    Ok(Some(TestOutcome { statistic: t, p_value: p }))
}

/// Mann–Whitney U test, two-sided, normal approximation with tie
/// correction and continuity correction. The statistic is U for `a`.
pub fn mann_whitney_u(a: &[f64], b: &[f64]) -> Result<TestOutcome> {
    if a.is_empty() || b.is_empty() {
        return Err(LinchpinError::Computation(
            "mann-whitney needs at least one observation per group".into(),
        ));
    }
    let (na, nb) = (a.len() as f64, b.len() as f64);
    let n = na + nb;

    let combined: Vec<f64> = a.iter().chain(b.iter()).copied().collect();
    let (ranks, tie_term) = average_ranks(&combined);
    let rank_sum_a: f64 = ranks[..a.len()].iter().sum();
    let u = rank_sum_a - na * (na + 1.0) / 2.0;

    let mu = na * nb / 2.0;
    let var = na * nb / 12.0 * ((n + 1.0) - tie_term / (n * (n - 1.0)));
    if var <= 0.0 || !var.is_finite() {
        return Ok(TestOutcome { statistic: u, p_value: 1.0 });
    }
    let z = ((u - mu).abs() - 0.5).max(0.0) / var.sqrt();
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| LinchpinError::Computation(format!("standard normal: {e}")))?;
    let p = (2.0 * normal.sf(z)).clamp(0.0, 1.0);
    Ok(TestOutcome { statistic: u, p_value: p })
}
