//! linchpin-ranker — Stage 3: linchpin scoring and druggability.
//!
//! Combines survival association, network centrality, cross-compartment
//! connectivity and regulator evidence into one weighted score per gene.

pub mod config;
pub mod druggability_provider;
pub mod engine;
pub mod evidence;
pub mod normalise;
pub mod prognostic;
pub mod regulator_provider;
pub mod scorer;
pub mod weights;

pub use config::{CrossDomainMode, ScoringConfig, SurvivalTest};
pub use druggability_provider::{DruggabilityProvider, MockDruggabilityProvider};
pub use engine::{ranking_order, run_linchpin, LinchpinInputs, LinchpinOutput};
pub use evidence::{
    DruggabilityRecord, EvidenceCard, MasterRegulator, Neighbour, NetworkEvidence,
    RegulatorEvidence, ScoreBreakdown, Stage1Evidence,
};
pub use normalise::Normalisation;
pub use prognostic::{assess_gene, SurvivalAssociation};
pub use regulator_provider::{mutation_frequencies, MockRegulatorProvider, RegulatorProvider};
pub use scorer::ComponentScores;
pub use weights::{HubWeights, LinchpinWeights};
