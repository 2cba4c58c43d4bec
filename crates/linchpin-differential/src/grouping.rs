//! Contrast group derivation from clinical records.

use std::collections::HashSet;

use tracing::{debug, warn};

use linchpin_common::{ClinicalTable, ExpressionMatrix, LinchpinError, Result};
use linchpin_stats::median;

use crate::config::GroupingStrategy;

/// Sample column indices (into the expression matrix) of each group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupSplit {
    pub group_a: Vec<usize>,
    pub group_b: Vec<usize>,
    /// Matrix samples in neither group.
    pub excluded: usize,
}

impl GroupSplit {
    pub fn sample_ids<'a>(&self, matrix: &'a ExpressionMatrix, group: &[usize]) -> Vec<&'a str> {
        group.iter().map(|&i| matrix.samples()[i].as_str()).collect()
    }
}

/// Derive the two contrast groups.
///
/// Fails with `InputValidation` when the contrast cannot be formed from the
/// inputs: an unknown covariate column, an explicit group A with no matrix
/// sample, or an empty group.
pub fn derive_groups(
    matrix: &ExpressionMatrix,
    clinical: &ClinicalTable,
    strategy: &GroupingStrategy,
) -> Result<GroupSplit> {
    // None = excluded, Some(true) = group A.
    let membership: Vec<Option<bool>> = match strategy {
        GroupingStrategy::SurvivalMedian => {
            let times: Vec<f64> = matrix
                .samples()
                .iter()
                .filter_map(|s| clinical.get(s).map(|r| r.os_time))
                .collect();
            let cutoff = median(&times).ok_or_else(|| {
                LinchpinError::InputValidation("no survival times for the matrix samples".into())
            })?;
            debug!(cutoff, "Survival median split");
            matrix
                .samples()
                .iter()
                .map(|s| clinical.get(s).map(|r| r.os_time < cutoff))
                .collect()
        }
        GroupingStrategy::EventStatus => matrix
            .samples()
            .iter()
            .map(|s| clinical.get(s).map(|r| r.os_event))
            .collect(),
        GroupingStrategy::Covariate { column, case_values } => {
            let known = matrix
                .samples()
                .iter()
                .filter_map(|s| clinical.get(s))
                .any(|r| r.covariates.contains_key(column));
            if !known {
                return Err(LinchpinError::InputValidation(format!(
                    "grouping covariate column '{column}' is absent from the clinical table"
                )));
            }
            let cases: HashSet<&str> = case_values.iter().map(String::as_str).collect();
            matrix
                .samples()
                .iter()
                .map(|s| {
                    clinical
                        .get(s)
                        .and_then(|r| r.covariates.get(column))
                        .filter(|v| !v.is_empty())
                        .map(|v| cases.contains(v.as_str()))
                })
                .collect()
        }
        GroupingStrategy::Explicit { group_a } => {
            let listed: HashSet<&str> = group_a.iter().map(String::as_str).collect();
            let unknown = listed
                .iter()
                .filter(|s| !matrix.samples().iter().any(|m| m.as_str() == **s))
                .count();
            if unknown == listed.len() {
                return Err(LinchpinError::InputValidation(
                    "explicit group A matches no expression sample".into(),
                ));
            }
            if unknown > 0 {
                warn!(unknown, "Explicit group A lists samples absent from the expression matrix");
            }
            matrix
                .samples()
                .iter()
                .map(|s| Some(listed.contains(s.as_str())))
                .collect()
        }
    };

    let mut split = GroupSplit::default();
    for (i, m) in membership.into_iter().enumerate() {
        match m {
            Some(true) => split.group_a.push(i),
            Some(false) => split.group_b.push(i),
            None => split.excluded += 1,
        }
    }
    debug!(
        group_a = split.group_a.len(),
        group_b = split.group_b.len(),
        excluded = split.excluded,
        "Contrast groups derived"
    );
    if split.group_a.is_empty() || split.group_b.is_empty() {
        return Err(LinchpinError::InputValidation(format!(
            "contrast has an empty group ({} vs {} samples)",
            split.group_a.len(),
            split.group_b.len()
        )));
    }
    Ok(split)
}

#[cfg(test)]
mod tests {
    use super::*;
    use linchpin_common::Sample;

    fn fixture() -> (ExpressionMatrix, ClinicalTable) {
        let samples: Vec<String> = (1..=4).map(|i| format!("S{i}")).collect();
        let m = ExpressionMatrix::from_rows(samples, vec![("G".into(), vec![1.0, 2.0, 3.0, 4.0])]).unwrap();
        let c = ClinicalTable::new(vec![
            Sample::new("S1", 10.0, true).with_covariate("stage", "III"),
            Sample::new("S2", 20.0, false).with_covariate("stage", "I"),
            Sample::new("S3", 30.0, true),
            Sample::new("S4", 40.0, false).with_covariate("stage", "IV"),
        ])
        .unwrap();
        (m, c)
    }

    #[test]
    fn test_survival_median_strictly_below() {
        let (m, c) = fixture();
        let split = derive_groups(&m, &c, &GroupingStrategy::SurvivalMedian).unwrap();
        assert_eq!(split.group_a, vec![0, 1]);
        assert_eq!(split.group_b, vec![2, 3]);
    }

    #[test]
    fn test_event_status() {
        let (m, c) = fixture();
        let split = derive_groups(&m, &c, &GroupingStrategy::EventStatus).unwrap();
        assert_eq!(split.group_a, vec![0, 2]);
    }

    #[test]
    fn test_covariate_excludes_missing() {
        let (m, c) = fixture();
        let strategy = GroupingStrategy::Covariate {
            column: "stage".into(),
            case_values: vec!["III".into(), "IV".into()],
        };
        let split = derive_groups(&m, &c, &strategy).unwrap();
        assert_eq!(split.group_a, vec![0, 3]);
        assert_eq!(split.group_b, vec![1]);
        assert_eq!(split.excluded, 1);
    }

    #[test]
    fn test_explicit() {
        let (m, c) = fixture();
        let strategy = GroupingStrategy::Explicit { group_a: vec!["S4".into(), "S9".into()] };
        let split = derive_groups(&m, &c, &strategy).unwrap();
        assert_eq!(split.group_a, vec![3]);
        assert_eq!(split.sample_ids(&m, &split.group_b), vec!["S1", "S2", "S3"]);
    }

    #[test]
    fn test_unknown_covariate_column_rejected() {
        let (m, c) = fixture();
        let strategy = GroupingStrategy::Covariate {
            column: "grade".into(),
            case_values: vec!["G3".into()],
        };
        let err = derive_groups(&m, &c, &strategy).unwrap_err();
        assert!(matches!(err, LinchpinError::InputValidation(_)), "{err}");
    }

    #[test]
    fn test_explicit_without_matrix_samples_rejected() {
        let (m, c) = fixture();
        let strategy = GroupingStrategy::Explicit { group_a: vec!["X1".into()] };
        assert!(matches!(
            derive_groups(&m, &c, &strategy),
            Err(LinchpinError::InputValidation(_))
        ));
    }

    #[test]
    fn test_empty_group_rejected() {
        let (m, c) = fixture();
        let strategy = GroupingStrategy::Covariate {
            column: "stage".into(),
            case_values: vec!["I".into(), "III".into(), "IV".into()],
        };
        let err = derive_groups(&m, &c, &strategy).unwrap_err();
        assert!(err.to_string().contains("empty group"), "{err}");
    }
}
