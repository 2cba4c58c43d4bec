//! Stage 1 engine.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use linchpin_common::{
    ClinicalTable, Compartment, CompartmentAssignment, DataQualityFlag, DifferentialResult,
    ExpressionMatrix, LinchpinError, QualityKind, Result, Stage,
};
use linchpin_stats::{adjust_p_values, mann_whitney_u, mean, welch_t_test};

use crate::config::{DifferentialConfig, TestMethod};
use crate::grouping::{derive_groups, GroupSplit};
use crate::summary::{summarise, CompartmentSummary};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CompartmentStatus {
    Completed,
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompartmentOutcome {
    pub compartment: Compartment,
    pub status: CompartmentStatus,
    /// Sorted by gene id. Empty when the compartment failed.
    pub results: Vec<DifferentialResult>,
    pub summary: Option<CompartmentSummary>,
}

/// Stage 1 output. Always holds one outcome per compartment.
#[derive(Debug, Clone, PartialEq)]
pub struct DifferentialOutput {
    pub outcomes: BTreeMap<Compartment, CompartmentOutcome>,
    pub unassigned_genes: usize,
    pub group_a_size: usize,
    pub group_b_size: usize,
    pub flags: Vec<DataQualityFlag>,
}

impl DifferentialOutput {
    pub fn results_for(&self, compartment: Compartment) -> &[DifferentialResult] {
        self.outcomes
            .get(&compartment)
            .map(|o| o.results.as_slice())
            .unwrap_or_default()
    }

    /// All rows, compartment order then gene id.
    pub fn all_results(&self) -> impl Iterator<Item = &DifferentialResult> {
        self.outcomes.values().flat_map(|o| o.results.iter())
    }

    pub fn failed_compartments(&self) -> Vec<Compartment> {
        self.outcomes
            .values()
            .filter(|o| matches!(o.status, CompartmentStatus::Failed { .. }))
            .map(|o| o.compartment)
            .collect()
    }
}

/// Outcome of testing one gene.
struct GeneTest {
    effect: f64,
    p_value: f64,
    n_a: usize,
    n_b: usize,
    flag: Option<(QualityKind, String)>,
}

impl GeneTest {
    fn null(n_a: usize, n_b: usize) -> Self {
        Self { effect: 0.0, p_value: 1.0, n_a, n_b, flag: None }
    }
}

fn observed(row: &[f64], group: &[usize]) -> Vec<f64> {
    group.iter().map(|&i| row[i]).filter(|v| v.is_finite()).collect()
}

fn test_gene(row: &[f64], split: &GroupSplit, config: &DifferentialConfig) -> GeneTest {
    let a = observed(row, &split.group_a);
    let b = observed(row, &split.group_b);
    let (n_a, n_b) = (a.len(), b.len());

    if n_a < 2 || n_b < 2 {
        let mut t = GeneTest::null(n_a, n_b);
        t.flag = Some((
            QualityKind::InsufficientObservations,
            format!("{n_a} and {n_b} finite observations, need 2 per group"),
        ));
        return t;
    }

    let (lo, hi) = a
        .iter()
        .chain(&b)
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if hi - lo == 0.0 {
        return GeneTest::null(n_a, n_b);
    }

    let effect = mean(&a) - mean(&b);
    let use_welch = match config.test_method {
        TestMethod::Welch => true,
        TestMethod::MannWhitney => false,
        TestMethod::Auto => {
            n_a >= config.parametric_min_group_size && n_b >= config.parametric_min_group_size
        }
    };

    let p = if use_welch {
        match welch_t_test(&a, &b) {
            Ok(Some(out)) => Ok(out.p_value),
            Ok(None) if effect != 0.0 => mann_whitney_u(&a, &b).map(|o| o.p_value),
            Ok(None) => Ok(1.0),
            Err(e) => Err(e),
        }
    } else {
        mann_whitney_u(&a, &b).map(|o| o.p_value)
    };

    match p {
        Ok(p_value) => GeneTest { effect, p_value, n_a, n_b, flag: None },
        Err(e) => {
            let mut t = GeneTest::null(n_a, n_b);
            t.flag = Some((QualityKind::ComputationFailed, e.to_string()));
            t
        }
    }
}

fn run_compartment(
    compartment: Compartment,
    matrix: &ExpressionMatrix,
    genes: &[(&str, usize)],
    split: &GroupSplit,
    config: &DifferentialConfig,
    flags: &mut Vec<DataQualityFlag>,
) -> Result<Vec<DifferentialResult>> {
    if genes.is_empty() {
        return Ok(Vec::new());
    }
    // Sparse genes are handled per gene; only the contrast sizes gate the compartment.
    let (n_a, n_b) = (split.group_a.len(), split.group_b.len());
    if n_a < config.min_samples_per_group || n_b < config.min_samples_per_group {
        return Err(LinchpinError::InsufficientSamples {
            compartment,
            group_a: n_a,
            group_b: n_b,
            minimum: config.min_samples_per_group,
        });
    }

    let tests: Vec<GeneTest> = genes
        .par_iter()
        .map(|(_, idx)| test_gene(matrix.row(*idx), split, config))
        .collect();

    let raw: Vec<f64> = tests.iter().map(|t| t.p_value).collect();
    let adjusted = adjust_p_values(&raw, config.correction);

    let mut results = Vec::with_capacity(genes.len());
    for (((gene, _), test), adj) in genes.iter().zip(tests).zip(adjusted) {
        if let Some((kind, message)) = test.flag {
            flags.push(
                DataQualityFlag::new(Stage::Differential, kind, message)
                    .for_gene(*gene)
                    .in_compartment(compartment),
            );
        }
        results.push(DifferentialResult {
            gene_id: gene.to_string(),
            compartment,
            effect_size: test.effect,
            p_value: test.p_value,
            adjusted_p_value: adj,
            n_group_a: test.n_a,
            n_group_b: test.n_b,
        });
    }
    Ok(results)
}

/// Run Stage 1 over every compartment.
///
/// A compartment that cannot be tested is recorded as failed; the others
/// still run. Only a contrast that cannot be derived at all is an error.
pub fn run_differential(
    matrix: &ExpressionMatrix,
    clinical: &ClinicalTable,
    assignment: &CompartmentAssignment,
    config: &DifferentialConfig,
) -> Result<DifferentialOutput> {
    let split = derive_groups(matrix, clinical, &config.grouping)?;
    info!(
        group_a = split.group_a.len(),
        group_b = split.group_b.len(),
        "Stage 1: testing {} genes",
        matrix.n_genes()
    );

    let mut flags = Vec::new();
    let mut by_compartment: BTreeMap<Compartment, Vec<(&str, usize)>> = BTreeMap::new();
    let mut unassigned = 0usize;
    for (idx, gene) in matrix.genes().iter().enumerate() {
        match assignment.compartment_of(gene) {
            Some(c) => by_compartment.entry(c).or_default().push((gene.as_str(), idx)),
            None => unassigned += 1,
        }
    }
    if unassigned > 0 {
        flags.push(DataQualityFlag::new(
            Stage::Differential,
            QualityKind::UnassignedGene,
            format!("{unassigned} expression genes have no compartment and were skipped"),
        ));
    }

    let mut outcomes = BTreeMap::new();
    for compartment in Compartment::ALL {
        let mut genes = by_compartment.remove(&compartment).unwrap_or_default();
        genes.sort_by(|a, b| a.0.cmp(b.0));

        let outcome = match run_compartment(compartment, matrix, &genes, &split, config, &mut flags) {
            Ok(results) => {
                let summary = summarise(compartment, &results, config.alpha, config.summary_top_n);
                debug!(
                    compartment = %compartment,
                    tested = summary.n_tested,
                    significant = summary.n_significant,
                    "Compartment tested"
                );
                CompartmentOutcome {
                    compartment,
                    status: CompartmentStatus::Completed,
                    results,
                    summary: Some(summary),
                }
            }
            Err(e) => {
                warn!(compartment = %compartment, error = %e, "Compartment skipped");
                flags.push(
                    DataQualityFlag::new(Stage::Differential, QualityKind::InsufficientSamples, e.to_string())
                        .in_compartment(compartment),
                );
                CompartmentOutcome {
                    compartment,
                    status: CompartmentStatus::Failed { error: e.to_string() },
                    results: Vec::new(),
                    summary: None,
                }
            }
        };
        outcomes.insert(compartment, outcome);
    }

    let output = DifferentialOutput {
        outcomes,
        unassigned_genes: unassigned,
        group_a_size: split.group_a.len(),
        group_b_size: split.group_b.len(),
        flags,
    };
    info!(
        rows = output.all_results().count(),
        failed = output.failed_compartments().len(),
        unassigned,
        "Stage 1 complete"
    );
    Ok(output)
}
