//! Stage 3 engine.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use linchpin_common::reference::RegulatorClass;
use linchpin_common::{
    ClinicalTable, DataQualityFlag, DifferentialResult, ExpressionMatrix, LinchpinError,
    LinchpinScore, MutationRecord, NetworkEdge, QualityKind, Result, Stage,
};
use linchpin_differential::DifferentialOutput;
use linchpin_network::NetworkOutput;

use crate::config::ScoringConfig;
use crate::druggability_provider::DruggabilityProvider;
use crate::evidence::{
    DruggabilityRecord, EvidenceCard, MasterRegulator, NetworkEvidence, RegulatorEvidence,
    ScoreBreakdown, Stage1Evidence,
};
use crate::normalise::{max_normalise, normalise};
use crate::prognostic::{assess_gene, SurvivalAssociation};
use crate::regulator_provider::{mutation_frequencies, RegulatorProvider};
use crate::scorer::{compute_linchpin_score, cross_domain_score, raw_hub_score, ComponentScores};

/// Everything Stage 3 reads. Reference data is reached through the
/// provider traits.
pub struct LinchpinInputs<'a> {
    pub differential: &'a DifferentialOutput,
    pub network: &'a NetworkOutput,
    pub expression: &'a ExpressionMatrix,
    pub clinical: &'a ClinicalTable,
    pub mutations: &'a [MutationRecord],
    pub regulators: &'a dyn RegulatorProvider,
    pub druggability: &'a dyn DruggabilityProvider,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinchpinOutput {
    /// Ranked, rank 1 first.
    pub scores: Vec<LinchpinScore>,
    /// Usable survival associations keyed by gene id.
    pub survival: BTreeMap<String, SurvivalAssociation>,
    pub druggability: Vec<DruggabilityRecord>,
    pub master_regulators: Vec<MasterRegulator>,
    pub evidence_cards: Vec<EvidenceCard>,
    pub flags: Vec<DataQualityFlag>,
}

/// Descending score, then descending prognostic score, then gene id.
pub fn ranking_order(a: &LinchpinScore, b: &LinchpinScore) -> Ordering {
    b.linchpin_score
        .total_cmp(&a.linchpin_score)
        .then_with(|| b.prognostic_score.total_cmp(&a.prognostic_score))
        .then_with(|| a.gene_id.cmp(&b.gene_id))
}

/// Per-candidate intermediate values, in centrality-table order.
struct Candidate<'a> {
    edges: Vec<&'a NetworkEdge>,
    survival: Option<SurvivalAssociation>,
    regulator_class: Option<RegulatorClass>,
    mutation_frequency: f64,
    components: ComponentScores,
}

pub fn run_linchpin(inputs: &LinchpinInputs<'_>, config: &ScoringConfig) -> Result<LinchpinOutput> {
    config.validate()?;
    let network = inputs.network;
    let records = &network.centrality;
    let n = records.len();
    info!(candidates = n, test = ?config.survival_test, "Stage 3: scoring linchpin candidates");

    let mut incident: HashMap<&str, Vec<&NetworkEdge>> = HashMap::new();
    for e in &network.edges {
        incident.entry(e.gene_a.as_str()).or_default().push(e);
        incident.entry(e.gene_b.as_str()).or_default().push(e);
    }

    // ── Prognostic ──
    let assessed: Vec<Result<SurvivalAssociation>> = records
        .par_iter()
        .map(|r| {
            let values = inputs.expression.gene_values(&r.gene_id).ok_or_else(|| {
                LinchpinError::Computation(format!("{} is not in the expression matrix", r.gene_id))
            })?;
            assess_gene(
                values,
                inputs.expression.samples(),
                inputs.clinical,
                config.survival_test,
                config.min_survival_samples,
            )
        })
        .collect();

    let mut flags = Vec::new();
    let mut survival: Vec<Option<SurvivalAssociation>> = Vec::with_capacity(n);
    for (r, outcome) in records.iter().zip(assessed) {
        match outcome {
            Ok(a) => survival.push(Some(a)),
            Err(e) => {
                debug!(gene = %r.gene_id, error = %e, "No usable survival association");
                flags.push(
                    DataQualityFlag::new(Stage::Linchpin, QualityKind::MissingSurvival, e.to_string())
                        .for_gene(r.gene_id.as_str())
                        .in_compartment(r.compartment),
                );
                survival.push(None);
            }
        }
    }
    if !flags.is_empty() {
        warn!(genes = flags.len(), "Prognostic score set to 0 where survival data was unusable");
    }

    let usable: Vec<usize> = (0..n).filter(|&i| survival[i].is_some()).collect();
    let raw: Vec<f64> = usable
        .iter()
        .filter_map(|&i| survival[i].as_ref().map(|a| a.raw_score))
        .collect();
    let mut prognostic = vec![0.0; n];
    for (&i, v) in usable.iter().zip(normalise(&raw, config.prognostic_normalisation)) {
        prognostic[i] = v;
    }

    // ── Network hub ──
    let hub_raw: Vec<f64> = records.iter().map(|r| raw_hub_score(r, &config.hub_weights)).collect();
    let hub = max_normalise(&hub_raw);

    // ── Regulator ──
    let frequencies = mutation_frequencies(inputs.mutations, inputs.clinical);
    let candidate_freq: Vec<f64> = records
        .iter()
        .map(|r| frequencies.get(&r.gene_id).copied().unwrap_or(0.0))
        .collect();
    let max_freq = candidate_freq.iter().cloned().fold(0.0f64, f64::max);

    let candidates: Vec<Candidate<'_>> = records
        .iter()
        .zip(survival)
        .enumerate()
        .map(|(i, (r, assoc))| {
            let edges = incident.remove(r.gene_id.as_str()).unwrap_or_default();
            let regulator_class = inputs.regulators.regulator_class(&r.gene_id);
            let annotation = if regulator_class.is_some() { 1.0 } else { 0.0 };
            let mutation = if max_freq > 0.0 { candidate_freq[i] / max_freq } else { 0.0 };
            let components = ComponentScores {
                prognostic: prognostic[i],
                network_hub: hub[i],
                cross_domain: cross_domain_score(&r.gene_id, &edges, config.cross_domain_mode),
                regulator: f64::max(annotation, mutation),
            };
            Candidate {
                edges,
                survival: assoc,
                regulator_class,
                mutation_frequency: candidate_freq[i],
                components,
            }
        })
        .collect();

    // ── Ranking ──
    let mut scores: Vec<LinchpinScore> = records
        .iter()
        .zip(&candidates)
        .map(|(r, c)| LinchpinScore {
            rank: 0,
            gene_id: r.gene_id.clone(),
            compartment: r.compartment,
            prognostic_score: c.components.prognostic,
            network_hub_score: c.components.network_hub,
            cross_domain_score: c.components.cross_domain,
            regulator_score: c.components.regulator,
            linchpin_score: compute_linchpin_score(&c.components, &config.weights),
            druggable: inputs.druggability.is_druggable(&r.gene_id),
        })
        .collect();
    scores.sort_by(ranking_order);
    for (k, s) in scores.iter_mut().enumerate() {
        s.rank = k + 1;
    }

    // ── Reporting ──
    let position: HashMap<&str, usize> =
        records.iter().enumerate().map(|(i, r)| (r.gene_id.as_str(), i)).collect();
    let stage1: HashMap<&str, &DifferentialResult> =
        inputs.differential.all_results().map(|r| (r.gene_id.as_str(), r)).collect();

    let mut druggability = Vec::new();
    let mut evidence_cards = Vec::new();
    for s in scores
        .iter()
        .filter(|s| s.linchpin_score >= config.evidence_min_score)
        .take(config.evidence_top_n)
    {
        let Some(&i) = position.get(s.gene_id.as_str()) else { continue };
        let c = &candidates[i];
        let target = inputs.druggability.target(&s.gene_id);
        let record = DruggabilityRecord {
            rank: s.rank,
            gene_id: s.gene_id.clone(),
            compartment: s.compartment,
            linchpin_score: s.linchpin_score,
            druggable: s.druggable,
            in_reference: target.is_some(),
            target_class: target.as_ref().map(|t| t.target_class.clone()),
            drugs: target.map(|t| t.drugs).unwrap_or_default(),
        };

        let data_quality: Vec<DataQualityFlag> = inputs
            .differential
            .flags
            .iter()
            .chain(&network.flags)
            .chain(&flags)
            .filter(|f| f.gene_id.as_deref() == Some(s.gene_id.as_str()))
            .cloned()
            .collect();

        evidence_cards.push(EvidenceCard {
            rank: s.rank,
            gene_id: s.gene_id.clone(),
            compartment: s.compartment,
            scores: ScoreBreakdown {
                linchpin: s.linchpin_score,
                prognostic: s.prognostic_score,
                network_hub: s.network_hub_score,
                cross_domain: s.cross_domain_score,
                regulator: s.regulator_score,
            },
            stage1: stage1.get(s.gene_id.as_str()).map(|r| Stage1Evidence::from(*r)),
            survival: c.survival.clone(),
            network: NetworkEvidence::new(&records[i], &c.edges, network.clustering(&s.gene_id), config.top_neighbours),
            druggability: record.clone(),
            regulator_class: c.regulator_class,
            data_quality,
        });
        druggability.push(record);
    }

    let mut master_regulators: Vec<MasterRegulator> = scores
        .iter()
        .filter(|s| s.regulator_score > 0.0)
        .filter_map(|s| {
            let c = &candidates[*position.get(s.gene_id.as_str())?];
            Some(MasterRegulator {
                rank: s.rank,
                gene_id: s.gene_id.clone(),
                compartment: s.compartment,
                regulator_class: c.regulator_class,
                evidence_source: if c.regulator_class.is_some() {
                    RegulatorEvidence::Annotation
                } else {
                    RegulatorEvidence::MutationFrequency
                },
                mutation_frequency: c.mutation_frequency,
                regulator_score: s.regulator_score,
            })
        })
        .collect();
    master_regulators.sort_by(|a, b| {
        b.regulator_score
            .total_cmp(&a.regulator_score)
            .then_with(|| a.rank.cmp(&b.rank))
    });

    let survival: BTreeMap<String, SurvivalAssociation> = records
        .iter()
        .zip(&candidates)
        .filter_map(|(r, c)| c.survival.clone().map(|a| (r.gene_id.clone(), a)))
        .collect();

    info!(
        scored = scores.len(),
        druggable = scores.iter().filter(|s| s.druggable).count(),
        master_regulators = master_regulators.len(),
        cards = evidence_cards.len(),
        "Stage 3 complete"
    );

    Ok(LinchpinOutput {
        scores,
        survival,
        druggability,
        master_regulators,
        evidence_cards,
        flags,
    })
}
