//! Per-gene survival association.
//!
//! Samples with finite expression are split at the median (≥ median is
//! "high") for the log-rank test; the Cox model uses expression directly.
//! The raw prognostic score is −log10(max(p, 1e-10)) · |ln HR|.

use serde::{Deserialize, Serialize};

use linchpin_common::{ClinicalTable, LinchpinError, Result};
use linchpin_stats::{cox_univariate, log_rank, median};

use crate::config::SurvivalTest;

const MIN_P: f64 = 1e-10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurvivalAssociation {
    pub test: SurvivalTest,
    pub n_samples: usize,
    pub n_events: usize,
    pub hazard_ratio: f64,
    pub p_value: f64,
    pub raw_score: f64,
}

pub fn raw_prognostic_score(p_value: f64, hazard_ratio: f64) -> f64 {
    let p = if p_value.is_finite() { p_value.max(MIN_P) } else { 1.0 };
    let effect = hazard_ratio.ln().abs();
    if !effect.is_finite() {
        return 0.0;
    }
    -p.log10() * effect
}

/// Survival association of one gene. `values` is aligned with `sample_ids`.
///
/// Errors when fewer than `min_samples` usable samples remain, when no event
/// is observed, or when the underlying test cannot be computed.
pub fn assess_gene(
    values: &[f64],
    sample_ids: &[String],
    clinical: &ClinicalTable,
    test: SurvivalTest,
    min_samples: usize,
) -> Result<SurvivalAssociation> {
    let mut expr = Vec::with_capacity(values.len());
    let mut times = Vec::with_capacity(values.len());
    let mut events = Vec::with_capacity(values.len());
    for (v, id) in values.iter().zip(sample_ids) {
        let Some(sample) = clinical.get(id) else { continue };
        if v.is_finite() && sample.os_time.is_finite() {
            expr.push(*v);
            times.push(sample.os_time);
            events.push(sample.os_event);
        }
    }

    if expr.len() < min_samples {
        return Err(LinchpinError::Computation(format!(
            "{} usable samples, need {min_samples}",
            expr.len()
        )));
    }
    let n_events = events.iter().filter(|e| **e).count();
    if n_events == 0 {
        return Err(LinchpinError::Computation("no observed events".into()));
    }

    let (hazard_ratio, p_value) = match test {
        SurvivalTest::LogRank => {
            let cut = median(&expr)
                .ok_or_else(|| LinchpinError::Computation("no finite expression".into()))?;
            let high: Vec<bool> = expr.iter().map(|v| *v >= cut).collect();
            let outcome = log_rank(&times, &events, &high)?;
            (outcome.hazard_ratio, outcome.p_value)
        }
        SurvivalTest::Cox => {
            let outcome = cox_univariate(&times, &events, &expr)?;
            (outcome.hazard_ratio, outcome.p_value)
        }
    };

    Ok(SurvivalAssociation {
        test,
        n_samples: expr.len(),
        n_events,
        hazard_ratio,
        p_value,
        raw_score: raw_prognostic_score(p_value, hazard_ratio),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use linchpin_common::Sample;

    /// 20 samples; the first ten die early, the last ten are censored late.
    fn cohort() -> (Vec<String>, ClinicalTable) {
        let ids: Vec<String> = (0..20).map(|i| format!("S{i}")).collect();
        let clinical = ClinicalTable::new(
            (0..20)
                .map(|i| {
                    if i < 10 {
                        Sample::new(format!("S{i}"), 5.0 + i as f64, true)
                    } else {
                        Sample::new(format!("S{i}"), 100.0 + i as f64, i % 3 == 0)
                    }
                })
                .collect(),
        )
        .unwrap();
        (ids, clinical)
    }

    #[test]
    fn test_raw_score_formula() {
        assert_eq!(raw_prognostic_score(1.0, 2.0), 0.0);
        let s = raw_prognostic_score(0.01, std::f64::consts::E);
        assert!((s - 2.0).abs() < 1e-12);
        // p floored at 1e-10
        assert!((raw_prognostic_score(0.0, std::f64::consts::E) - 10.0).abs() < 1e-12);
        assert_eq!(raw_prognostic_score(0.01, 0.0), 0.0);
    }

    #[test]
    fn test_high_expression_with_poor_survival() {
        let (ids, clinical) = cohort();
        let values: Vec<f64> = (0..20).map(|i| if i < 10 { 8.0 + i as f64 * 0.1 } else { 2.0 }).collect();
        let assoc = assess_gene(&values, &ids, &clinical, SurvivalTest::LogRank, 10).unwrap();
        assert_eq!(assoc.n_samples, 20);
        assert!(assoc.hazard_ratio > 1.0);
        assert!(assoc.p_value < 0.01);
        assert!(assoc.raw_score > 0.0);
    }

    #[test]
    fn test_too_few_samples_is_error() {
        let (ids, clinical) = cohort();
        let mut values = vec![f64::NAN; 20];
        values[0] = 1.0;
        values[1] = 2.0;
        assert!(assess_gene(&values, &ids, &clinical, SurvivalTest::LogRank, 10).is_err());
    }

    #[test]
    fn test_no_events_is_error() {
        let ids: Vec<String> = (0..12).map(|i| format!("S{i}")).collect();
        let clinical =
            ClinicalTable::new((0..12).map(|i| Sample::new(format!("S{i}"), 10.0 + i as f64, false)).collect())
                .unwrap();
        let values: Vec<f64> = (0..12).map(|i| i as f64).collect();
        assert!(assess_gene(&values, &ids, &clinical, SurvivalTest::Cox, 10).is_err());
    }
}
