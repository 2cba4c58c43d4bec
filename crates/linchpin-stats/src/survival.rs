//! Survival association: two-group log-rank test and univariate Cox
//! proportional-hazards regression.

use linchpin_common::{LinchpinError, Result};
use statrs::distribution::{ChiSquared, ContinuousCDF, Normal};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogRankOutcome {
    pub chi_square: f64,
    pub p_value: f64,
    pub hazard_ratio: f64,
    pub observed_high: f64,
    pub expected_high: f64,
    pub observed_low: f64,
    pub expected_low: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoxOutcome {
    pub beta: f64,
    pub std_error: f64,
    pub z: f64,
    pub p_value: f64,
    pub hazard_ratio: f64,
    pub iterations: usize,
}

const COX_MAX_ITER: usize = 50;
const COX_TOLERANCE: f64 = 1e-9;
const COX_MAX_ABS_BETA: f64 = 20.0;

fn check_lengths(times: &[f64], events: &[bool], other: usize) -> Result<()> {
    if times.len() != events.len() || times.len() != other {
        return Err(LinchpinError::Computation(format!(
            "survival vectors differ in length: {} times, {} events, {} covariate values",
            times.len(),
            events.len(),
            other
        )));
    }
    Ok(())
}

/// Log-rank test comparing the `high` group against the rest.
///
/// The hazard ratio is (O_high / E_high) / (O_low / E_low). When either group
/// has no observed events, 0.5 is added to every O and E so the ratio stays
/// finite.
pub fn log_rank(times: &[f64], events: &[bool], high: &[bool]) -> Result<LogRankOutcome> {
    check_lengths(times, events, high.len())?;

    let mut event_times: Vec<f64> = times
        .iter()
        .zip(events)
        .filter(|(_, &e)| e)
        .map(|(&t, _)| t)
        .collect();
    event_times.sort_by(|a, b| a.total_cmp(b));
    event_times.dedup();
    if event_times.is_empty() {
        return Err(LinchpinError::Computation("log-rank: no events observed".into()));
    }

    let (mut observed_high, mut expected_high, mut var): (f64, f64, f64) = (0.0, 0.0, 0.0);
    let mut total_events: f64 = 0.0;
    for &t in &event_times {
        let (mut n, mut n_h, mut d, mut d_h) = (0.0, 0.0, 0.0, 0.0);
        for i in 0..times.len() {
            if times[i] >= t {
                n += 1.0;
                if high[i] {
                    n_h += 1.0;
                }
                if times[i] == t && events[i] {
                    d += 1.0;
                    if high[i] {
                        d_h += 1.0;
                    }
                }
            }
        }
        observed_high += d_h;
        total_events += d;
        expected_high += d * n_h / n;
        if n > 1.0 {
            var += d * (n_h / n) * (1.0 - n_h / n) * (n - d) / (n - 1.0);
        }
    }

    if var <= 0.0 {
        return Err(LinchpinError::Computation(
            "log-rank: zero variance (one group is empty at every event time)".into(),
        ));
    }
    let chi_square = (observed_high - expected_high).powi(2) / var;
    let dist = ChiSquared::new(1.0)
        .map_err(|e| LinchpinError::Computation(format!("chi-squared(1): {e}")))?;
    let p_value = dist.sf(chi_square).clamp(0.0, 1.0);

    let observed_low = total_events - observed_high;
    let expected_low = total_events - expected_high;
    let (oh, eh, ol, el) = if observed_high == 0.0 || observed_low == 0.0 {
        (observed_high + 0.5, expected_high + 0.5, observed_low + 0.5, expected_low + 0.5)
    } else {
        (observed_high, expected_high, observed_low, expected_low)
    };
    let hazard_ratio = (oh / eh) / (ol / el);
    if !(hazard_ratio.is_finite() && hazard_ratio > 0.0) {
        return Err(LinchpinError::Computation(format!(
            "log-rank: degenerate hazard ratio {hazard_ratio}"
        )));
    }

    Ok(LogRankOutcome {
        chi_square,
        p_value,
        hazard_ratio,
        observed_high,
        expected_high,
        observed_low,
        expected_low,
    })
}

/// Breslow partial log-likelihood with its score and information at `beta`.
/// `order` lists sample indices by descending time.
fn cox_partial(times: &[f64], events: &[bool], x: &[f64], order: &[usize], beta: f64) -> (f64, f64, f64) {
    let (mut s0, mut s1, mut s2) = (0.0, 0.0, 0.0);
    let (mut loglik, mut score, mut info) = (0.0, 0.0, 0.0);
    let mut i = 0;
    while i < order.len() {
        let t = times[order[i]];
        let mut j = i;
        while j < order.len() && times[order[j]] == t {
            let w = (beta * x[order[j]]).exp();
            s0 += w;
            s1 += w * x[order[j]];
            s2 += w * x[order[j]] * x[order[j]];
            j += 1;
        }
        for &k in &order[i..j] {
            if events[k] {
                let m1 = s1 / s0;
                loglik += beta * x[k] - s0.ln();
                score += x[k] - m1;
                info += s2 / s0 - m1 * m1;
            }
        }
        i = j;
    }
    (loglik, score, info)
}

/// Univariate Cox regression on a continuous covariate, fitted by
/// Newton–Raphson with step halving; Wald test for the coefficient.
pub fn cox_univariate(times: &[f64], events: &[bool], covariate: &[f64]) -> Result<CoxOutcome> {
    check_lengths(times, events, covariate.len())?;
    if !events.iter().any(|&e| e) {
        return Err(LinchpinError::Computation("cox: no events observed".into()));
    }

    // Centring leaves beta unchanged and keeps exp() in range.
    let centre = covariate.iter().sum::<f64>() / covariate.len() as f64;
    let x: Vec<f64> = covariate.iter().map(|v| v - centre).collect();

    let mut order: Vec<usize> = (0..times.len()).collect();
    order.sort_by(|&a, &b| times[b].total_cmp(&times[a]).then(a.cmp(&b)));

    let mut beta = 0.0;
    let (mut loglik, mut score, mut info) = cox_partial(times, events, &x, &order, beta);
    let mut iterations = 0;
    let mut converged = false;
    while iterations < COX_MAX_ITER {
        iterations += 1;
        if info <= 0.0 || !info.is_finite() {
            return Err(LinchpinError::Computation("cox: singular information".into()));
        }
        let mut step = score / info;
        let mut next = cox_partial(times, events, &x, &order, beta + step);
        let mut halvings = 0;
        while (!next.0.is_finite() || next.0 < loglik) && halvings < 20 {
            step /= 2.0;
            next = cox_partial(times, events, &x, &order, beta + step);
            halvings += 1;
        }
        beta += step;
        (loglik, score, info) = next;
        if beta.abs() > COX_MAX_ABS_BETA {
            return Err(LinchpinError::Computation(format!(
                "cox: coefficient diverged ({beta:.3}), likely monotone likelihood"
            )));
        }
        if step.abs() < COX_TOLERANCE {
            converged = true;
            break;
        }
    }
    if !converged {
        return Err(LinchpinError::Computation(format!(
            "cox: no convergence after {COX_MAX_ITER} iterations"
        )));
    }
    if info <= 0.0 || !info.is_finite() {
        return Err(LinchpinError::Computation("cox: singular information".into()));
    }

    let std_error = 1.0 / info.sqrt();
    let z = beta / std_error;
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| LinchpinError::Computation(format!("standard normal: {e}")))?;
    let p_value = (2.0 * normal.sf(z.abs())).clamp(0.0, 1.0);

    Ok(CoxOutcome {
        beta,
        std_error,
        z,
        p_value,
        hazard_ratio: beta.exp(),
        iterations,
    })
}
