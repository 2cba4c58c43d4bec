//! Per-compartment summary of the significant genes.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use linchpin_common::{Compartment, DifferentialResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneHit {
    pub gene_id: String,
    pub log2fc: f64,
    pub p_value: f64,
    pub adj_p_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompartmentSummary {
    pub compartment: Compartment,
    pub n_tested: usize,
    pub n_significant: usize,
    pub top_up: Vec<GeneHit>,
    pub top_down: Vec<GeneHit>,
}

/// Significance order: adjusted p, then p, then gene id.
pub fn significance_order(a: &DifferentialResult, b: &DifferentialResult) -> Ordering {
    a.adjusted_p_value
        .total_cmp(&b.adjusted_p_value)
        .then_with(|| a.p_value.total_cmp(&b.p_value))
        .then_with(|| a.gene_id.cmp(&b.gene_id))
}

pub fn summarise(
    compartment: Compartment,
    results: &[DifferentialResult],
    alpha: f64,
    top_n: usize,
) -> CompartmentSummary {
    let mut significant: Vec<&DifferentialResult> =
        results.iter().filter(|r| r.adjusted_p_value < alpha).collect();
    significant.sort_by(|a, b| significance_order(a, b));

    let hit = |r: &&DifferentialResult| GeneHit {
        gene_id: r.gene_id.clone(),
        log2fc: r.effect_size,
        p_value: r.p_value,
        adj_p_value: r.adjusted_p_value,
    };
    CompartmentSummary {
        compartment,
        n_tested: results.len(),
        n_significant: significant.len(),
        top_up: significant.iter().filter(|r| r.effect_size > 0.0).take(top_n).map(hit).collect(),
        top_down: significant.iter().filter(|r| r.effect_size < 0.0).take(top_n).map(hit).collect(),
    }
}
