//! Component scores and the composite linchpin score.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use linchpin_common::{CentralityRecord, Compartment, NetworkEdge};

use crate::config::CrossDomainMode;
use crate::weights::{HubWeights, LinchpinWeights};

/// Normalised component scores for one gene (all in [0, 1]).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ComponentScores {
    pub prognostic: f64,
    pub network_hub: f64,
    pub cross_domain: f64,
    pub regulator: f64,
}

impl ComponentScores {
    pub fn as_array(&self) -> [f64; 4] {
        [self.prognostic, self.network_hub, self.cross_domain, self.regulator]
    }
}

/// Weighted sum of the four components.
pub fn compute_linchpin_score(components: &ComponentScores, weights: &LinchpinWeights) -> f64 {
    components
        .as_array()
        .iter()
        .zip(weights.as_array().iter())
        .map(|(s, w)| s * w)
        .sum()
}

/// Weighted centrality sum before scaling by the candidate maximum.
pub fn raw_hub_score(record: &CentralityRecord, weights: &HubWeights) -> f64 {
    let c = [
        record.degree_centrality,
        record.betweenness_centrality,
        record.closeness_centrality,
        record.eigenvector_centrality,
    ];
    c.iter().zip(weights.as_array().iter()).map(|(v, w)| v * w).sum()
}

/// Cross-domain score from the edges incident to `gene`.
pub fn cross_domain_score(gene: &str, edges: &[&NetworkEdge], mode: CrossDomainMode) -> f64 {
    if edges.is_empty() {
        return 0.0;
    }
    let cross: Vec<&NetworkEdge> = edges.iter().copied().filter(|e| e.is_cross_dimensional()).collect();
    match mode {
        CrossDomainMode::Proportion => cross.len() as f64 / edges.len() as f64,
        CrossDomainMode::Diversity => {
            let partners: BTreeSet<Compartment> =
                cross.iter().filter_map(|e| e.other(gene)).map(|(_, c)| c).collect();
            let other_compartments = (Compartment::ALL.len() - 1) as f64;
            let diversity = partners.len() as f64 / other_compartments;
            let volume = (cross.len() as f64 / 10.0).min(1.0);
            (0.6 * diversity + 0.4 * volume).clamp(0.0, 1.0)
        }
    }
}
