//! Gene universe selection from Stage 1 results.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use linchpin_common::{Compartment, DifferentialResult};

use crate::config::NetworkConfig;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UniverseGene {
    pub gene_id: String,
    pub compartment: Compartment,
}

fn significance_order(a: &&DifferentialResult, b: &&DifferentialResult) -> std::cmp::Ordering {
    a.adjusted_p_value
        .total_cmp(&b.adjusted_p_value)
        .then_with(|| a.p_value.total_cmp(&b.p_value))
        .then_with(|| a.gene_id.cmp(&b.gene_id))
}

/// Per compartment, the `top_k_per_compartment` most significant genes with
/// adjusted p below `alpha`; the combined list is optionally capped by
/// `max_universe` in the same order. Returned in gene id order.
pub fn select_universe<'a, I>(results: I, config: &NetworkConfig) -> Vec<UniverseGene>
where
    I: IntoIterator<Item = &'a DifferentialResult>,
{
    let mut by_compartment: BTreeMap<Compartment, Vec<&DifferentialResult>> = BTreeMap::new();
    for r in results {
        if r.adjusted_p_value < config.alpha {
            by_compartment.entry(r.compartment).or_default().push(r);
        }
    }

    let mut selected: Vec<&DifferentialResult> = Vec::new();
    for rows in by_compartment.values_mut() {
        rows.sort_by(significance_order);
        selected.extend(rows.iter().take(config.top_k_per_compartment));
    }

    if let Some(cap) = config.max_universe {
        selected.sort_by(significance_order);
        selected.truncate(cap);
    }

    let mut universe: Vec<UniverseGene> = selected
        .into_iter()
        .map(|r| UniverseGene { gene_id: r.gene_id.clone(), compartment: r.compartment })
        .collect();
    universe.sort();
    universe.dedup_by(|a, b| a.gene_id == b.gene_id);
    universe
}
