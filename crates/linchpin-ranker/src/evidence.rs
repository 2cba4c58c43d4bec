//! Reporting records built from the ranked scores: druggability assessment,
//! master regulators and per-gene evidence cards.

use serde::{Deserialize, Serialize};

use linchpin_common::reference::RegulatorClass;
use linchpin_common::{CentralityRecord, Compartment, DataQualityFlag, DifferentialResult, NetworkEdge};

use crate::prognostic::SurvivalAssociation;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DruggabilityRecord {
    pub rank: usize,
    pub gene_id: String,
    pub compartment: Compartment,
    pub linchpin_score: f64,
    pub druggable: bool,
    pub in_reference: bool,
    pub target_class: Option<String>,
    pub drugs: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegulatorEvidence {
    Annotation,
    MutationFrequency,
}

impl RegulatorEvidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegulatorEvidence::Annotation => "annotation",
            RegulatorEvidence::MutationFrequency => "mutation_frequency",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasterRegulator {
    pub rank: usize,
    pub gene_id: String,
    pub compartment: Compartment,
    pub regulator_class: Option<RegulatorClass>,
    pub evidence_source: RegulatorEvidence,
    pub mutation_frequency: f64,
    pub regulator_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub linchpin: f64,
    pub prognostic: f64,
    pub network_hub: f64,
    pub cross_domain: f64,
    pub regulator: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage1Evidence {
    pub log2fc: f64,
    pub p_value: f64,
    pub adj_p_value: f64,
}

impl From<&DifferentialResult> for Stage1Evidence {
    fn from(r: &DifferentialResult) -> Self {
        Self {
            log2fc: r.effect_size,
            p_value: r.p_value,
            adj_p_value: r.adjusted_p_value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neighbour {
    pub gene_id: String,
    pub compartment: Compartment,
    pub correlation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkEvidence {
    pub degree: usize,
    pub degree_centrality: f64,
    pub betweenness_centrality: f64,
    pub closeness_centrality: f64,
    pub eigenvector_centrality: f64,
    pub clustering_coefficient: f64,
    pub cross_dimensional_edges: usize,
    pub top_neighbours: Vec<Neighbour>,
}

impl NetworkEvidence {
    pub fn new(record: &CentralityRecord, edges: &[&NetworkEdge], clustering: f64, top_k: usize) -> Self {
        Self {
            degree: edges.len(),
            degree_centrality: record.degree_centrality,
            betweenness_centrality: record.betweenness_centrality,
            closeness_centrality: record.closeness_centrality,
            eigenvector_centrality: record.eigenvector_centrality,
            clustering_coefficient: clustering,
            cross_dimensional_edges: edges.iter().filter(|e| e.is_cross_dimensional()).count(),
            top_neighbours: top_neighbours(&record.gene_id, edges, top_k),
        }
    }
}

/// Strongest partners by |r|, ties broken by gene id.
pub fn top_neighbours(gene: &str, edges: &[&NetworkEdge], k: usize) -> Vec<Neighbour> {
    let mut neighbours: Vec<Neighbour> = edges
        .iter()
        .filter_map(|e| {
            e.other(gene).map(|(id, c)| Neighbour {
                gene_id: id.to_string(),
                compartment: c,
                correlation: e.correlation,
            })
        })
        .collect();
    neighbours.sort_by(|a, b| {
        b.correlation
            .abs()
            .total_cmp(&a.correlation.abs())
            .then_with(|| a.gene_id.cmp(&b.gene_id))
    });
    neighbours.truncate(k);
    neighbours
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceCard {
    pub rank: usize,
    pub gene_id: String,
    pub compartment: Compartment,
    pub scores: ScoreBreakdown,
    pub stage1: Option<Stage1Evidence>,
    pub survival: Option<SurvivalAssociation>,
    pub network: NetworkEvidence,
    pub druggability: DruggabilityRecord,
    pub regulator_class: Option<RegulatorClass>,
    pub data_quality: Vec<DataQualityFlag>,
}
