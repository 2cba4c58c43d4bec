use serde::{Deserialize, Serialize};

use linchpin_common::{LinchpinError, Result};

use crate::normalise::Normalisation;
use crate::weights::{HubWeights, LinchpinWeights};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurvivalTest {
    #[default]
    LogRank,
    Cox,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossDomainMode {
    /// Cross-compartment edges over all edges of the gene.
    #[default]
    Proportion,
    /// Blend of distinct partner compartments and cross-edge count.
    Diversity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default)]
    pub weights: LinchpinWeights,
    #[serde(default)]
    pub hub_weights: HubWeights,
    #[serde(default)]
    pub survival_test: SurvivalTest,
    #[serde(default)]
    pub prognostic_normalisation: Normalisation,
    #[serde(default)]
    pub cross_domain_mode: CrossDomainMode,
    #[serde(default = "default_min_survival_samples")]
    pub min_survival_samples: usize,
    #[serde(default = "default_evidence_min_score")]
    pub evidence_min_score: f64,
    #[serde(default = "default_evidence_top_n")]
    pub evidence_top_n: usize,
    #[serde(default = "default_top_neighbours")]
    pub top_neighbours: usize,
}

fn default_min_survival_samples() -> usize { 10 }
fn default_evidence_min_score() -> f64 { 0.0 }
fn default_evidence_top_n() -> usize { 20 }
fn default_top_neighbours() -> usize { 5 }

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: LinchpinWeights::default(),
            hub_weights: HubWeights::default(),
            survival_test: SurvivalTest::default(),
            prognostic_normalisation: Normalisation::default(),
            cross_domain_mode: CrossDomainMode::default(),
            min_survival_samples: default_min_survival_samples(),
            evidence_min_score: default_evidence_min_score(),
            evidence_top_n: default_evidence_top_n(),
            top_neighbours: default_top_neighbours(),
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<()> {
        self.weights.validate()?;
        self.hub_weights.validate()?;
        if self.min_survival_samples < 2 {
            return Err(LinchpinError::Config(format!(
                "scoring.min_survival_samples must be at least 2, got {}",
                self.min_survival_samples
            )));
        }
        if self.evidence_top_n == 0 {
            return Err(LinchpinError::Config("scoring.evidence_top_n must be positive".into()));
        }
        if !self.evidence_min_score.is_finite() || self.evidence_min_score < 0.0 {
            return Err(LinchpinError::Config(format!(
                "scoring.evidence_min_score must be non-negative, got {}",
                self.evidence_min_score
            )));
        }
        Ok(())
    }
}
