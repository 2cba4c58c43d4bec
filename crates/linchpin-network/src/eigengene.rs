//! Module eigengenes and their association with overall survival time.
//!
//! The eigengene of a module is the first principal component of its
//! members' standardised expression, oriented to agree with the mean member
//! profile and scaled to unit variance across samples.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use linchpin_common::{ClinicalTable, DataQualityFlag, ExpressionMatrix, QualityKind, Stage};
use linchpin_stats::{correlation_test, finite, mean, variance, CorrelationMethod};

use crate::modules::NetworkModule;

const POWER_MAX_ITER: usize = 1000;
const POWER_TOLERANCE: f64 = 1e-10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleEigengene {
    pub module_id: usize,
    /// One value per expression sample, in matrix sample order.
    pub values: Vec<f64>,
    /// Share of the standardised member variance carried by the component.
    pub variance_explained: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleTraitAssociation {
    pub module_id: usize,
    pub size: usize,
    /// Samples with both an eigengene value and a clinical record.
    pub n_samples: usize,
    /// Spearman rho between eigengene and os_time.
    pub os_time_correlation: f64,
    pub p_value: f64,
    pub significant: bool,
}

/// Row-standardised member expression. Missing values become 0 (the row
/// mean) and constant rows are dropped.
fn standardised_rows(expression: &ExpressionMatrix, members: &[String]) -> Vec<Vec<f64>> {
    members
        .iter()
        .filter_map(|g| expression.gene_values(g))
        .filter_map(|row| {
            let observed = finite(row);
            if observed.len() < 2 {
                return None;
            }
            let (m, sd) = (mean(&observed), variance(&observed).sqrt());
            if sd.is_nan() || sd <= 0.0 {
                return None;
            }
            Some(row.iter().map(|v| if v.is_finite() { (v - m) / sd } else { 0.0 }).collect())
        })
        .collect()
}

/// Leading eigenpair of a symmetric positive semi-definite matrix.
fn leading_eigenvector(cov: &[Vec<f64>]) -> Option<(Vec<f64>, f64)> {
    let p = cov.len();
    // Uneven start so no symmetric eigenvector is orthogonal to it.
    let mut v: Vec<f64> = (0..p).map(|i| 1.0 / (i + 1) as f64).collect();
    let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
    v.iter_mut().for_each(|x| *x /= norm);

    let mut lambda = 0.0;
    for _ in 0..POWER_MAX_ITER {
        let next: Vec<f64> = cov.iter().map(|row| row.iter().zip(&v).map(|(a, b)| a * b).sum()).collect();
        let norm = next.iter().map(|x| x * x).sum::<f64>().sqrt();
        if norm.is_nan() || norm <= 0.0 {
            return None;
        }
        let next: Vec<f64> = next.into_iter().map(|x| x / norm).collect();
        let delta: f64 = next.iter().zip(&v).map(|(a, b)| (a - b).abs()).sum();
        v = next;
        lambda = norm;
        if delta < POWER_TOLERANCE {
            break;
        }
    }
    Some((v, lambda))
}

/// Eigengene of one module, or `None` when no member has usable variation.
pub fn module_eigengene(expression: &ExpressionMatrix, module: &NetworkModule) -> Option<ModuleEigengene> {
    let z = standardised_rows(expression, &module.members);
    let n_samples = expression.n_samples();
    if z.is_empty() || n_samples < 2 {
        return None;
    }

    let denom = (n_samples - 1) as f64;
    let cov: Vec<Vec<f64>> = z
        .iter()
        .map(|a| z.iter().map(|b| a.iter().zip(b).map(|(x, y)| x * y).sum::<f64>() / denom).collect())
        .collect();
    let trace: f64 = (0..cov.len()).map(|i| cov[i][i]).sum();
    let (loadings, lambda) = leading_eigenvector(&cov)?;

    let mut values: Vec<f64> = (0..n_samples)
        .map(|s| z.iter().zip(&loadings).map(|(row, w)| row[s] * w).sum())
        .collect();
    let profile: Vec<f64> = (0..n_samples).map(|s| z.iter().map(|row| row[s]).sum::<f64>()).collect();
    if values.iter().zip(&profile).map(|(a, b)| a * b).sum::<f64>() < 0.0 {
        values.iter_mut().for_each(|v| *v = -*v);
    }
    let sd = variance(&values).sqrt();
    if sd.is_nan() || sd <= 0.0 {
        return None;
    }
    let m = mean(&values);
    values.iter_mut().for_each(|v| *v = (*v - m) / sd);

    Some(ModuleEigengene {
        module_id: module.module_id,
        values,
        variance_explained: if trace > 0.0 { (lambda / trace).clamp(0.0, 1.0) } else { 0.0 },
    })
}

/// Eigengenes for every module and their Spearman association with
/// `os_time`, over the samples present in `clinical`. Association failures
/// become flags; this never fails.
pub fn module_trait_associations(
    modules: &[NetworkModule],
    expression: &ExpressionMatrix,
    clinical: &ClinicalTable,
    alpha: f64,
) -> (Vec<ModuleEigengene>, Vec<ModuleTraitAssociation>, Vec<DataQualityFlag>) {
    let os_time: Vec<f64> = expression
        .samples()
        .iter()
        .map(|s| clinical.get(s).map(|r| r.os_time).unwrap_or(f64::NAN))
        .collect();

    let mut eigengenes = Vec::with_capacity(modules.len());
    let mut associations = Vec::with_capacity(modules.len());
    let mut flags = Vec::new();
    for module in modules {
        let Some(eigengene) = module_eigengene(expression, module) else {
            debug!(module = module.module_id, "Module has no expression variation; no eigengene");
            continue;
        };
        match correlation_test(CorrelationMethod::Spearman, &eigengene.values, &os_time) {
            Ok(Some(test)) => associations.push(ModuleTraitAssociation {
                module_id: module.module_id,
                size: module.size,
                n_samples: test.n,
                os_time_correlation: test.coefficient,
                p_value: test.p_value,
                significant: test.p_value < alpha,
            }),
            Ok(None) => flags.push(DataQualityFlag::new(
                Stage::Network,
                QualityKind::InsufficientObservations,
                format!("module {} has too few samples with survival time", module.module_id),
            )),
            Err(e) => {
                warn!(module = module.module_id, error = %e, "Module-trait correlation failed");
                flags.push(DataQualityFlag::new(Stage::Network, QualityKind::ComputationFailed, e.to_string()));
            }
        }
        eigengenes.push(eigengene);
    }
    (eigengenes, associations, flags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use linchpin_common::{Compartment, Sample};

    fn module(id: usize, members: &[&str]) -> NetworkModule {
        NetworkModule {
            module_id: id,
            size: members.len(),
            members: members.iter().map(|s| s.to_string()).collect(),
            dominant_compartment: Compartment::TumorCells,
            compartment_diversity: 1,
            cross_dimensional: false,
        }
    }

    fn cohort() -> (ExpressionMatrix, ClinicalTable) {
        let samples: Vec<String> = (0..10).map(|i| format!("S{i}")).collect();
        let trend: Vec<f64> = (0..10).map(f64::from).collect();
        let m = ExpressionMatrix::from_rows(
            samples.clone(),
            vec![
                ("G1".into(), trend.iter().map(|v| v + 0.1 * (v % 2.0)).collect()),
                ("G2".into(), trend.iter().map(|v| 2.0 * v + 1.0).collect()),
                ("G3".into(), trend.iter().map(|v| 20.0 - v).collect()),
                ("N1".into(), vec![3.0, 1.0, 4.0, 1.0, 5.0, 9.0, 2.0, 6.0, 5.0, 3.0]),
                ("N2".into(), vec![2.0, 7.0, 1.0, 8.0, 2.0, 8.0, 1.0, 8.0, 2.0, 8.0]),
                ("FLAT".into(), vec![1.0; 10]),
            ],
        )
        .unwrap();
        // survival grows with the G module; S9 has no clinical record
        let clinical = ClinicalTable::new(
            samples[..9]
                .iter()
                .enumerate()
                .map(|(i, s)| Sample::new(s.as_str(), 10.0 * (i + 1) as f64, i % 2 == 0))
                .collect(),
        )
        .unwrap();
        (m, clinical)
    }

    #[test]
    fn test_eigengene_follows_module_trend() {
        let (m, _) = cohort();
        let e = module_eigengene(&m, &module(1, &["G1", "G2", "G3"])).unwrap();
        assert_eq!(e.values.len(), 10);
        // G3 runs against the others, so the component still tracks the trend
        assert!(e.values.windows(2).filter(|w| w[1] > w[0]).count() >= 8);
        assert!(e.variance_explained > 0.9);
        assert!(mean(&e.values).abs() < 1e-9);
        assert!((variance(&e.values) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_survival_linked_module_is_significant() {
        let (m, clinical) = cohort();
        let modules = vec![module(1, &["G1", "G2", "G3"]), module(2, &["N1", "N2", "FLAT"])];
        let (eigengenes, assoc, flags) = module_trait_associations(&modules, &m, &clinical, 0.05);
        assert_eq!(eigengenes.len(), 2);
        assert!(flags.is_empty());

        let linked = assoc.iter().find(|a| a.module_id == 1).unwrap();
        assert_eq!(linked.n_samples, 9);
        assert!(linked.os_time_correlation > 0.9);
        assert!(linked.p_value < 0.001 && linked.significant);

        let noise = assoc.iter().find(|a| a.module_id == 2).unwrap();
        assert!(noise.os_time_correlation.abs() < linked.os_time_correlation);
    }

    #[test]
    fn test_module_without_variation_is_skipped() {
        let (m, clinical) = cohort();
        let (eigengenes, assoc, _) =
            module_trait_associations(&[module(3, &["FLAT", "MISSING"])], &m, &clinical, 0.05);
        assert!(eigengenes.is_empty() && assoc.is_empty());
    }
}
