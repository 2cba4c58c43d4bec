//! Weight vectors for the linchpin score and the network hub component.

use serde::{Deserialize, Serialize};

use linchpin_common::{LinchpinError, Result};

/// The 4-component weight vector of the final linchpin score.
/// Weights sum to 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinchpinWeights {
    /// Survival association strength
    #[serde(default = "default_prognostic")]
    pub prognostic: f64,
    /// Structural importance in the correlation network
    #[serde(default = "default_network_hub")]
    pub network_hub: f64,
    /// Connectivity across compartment boundaries
    #[serde(default = "default_cross_domain")]
    pub cross_domain: f64,
    /// Known regulator or frequently mutated
    #[serde(default = "default_regulator")]
    pub regulator: f64,
}

fn default_prognostic() -> f64 { 0.3 }
fn default_network_hub() -> f64 { 0.3 }
fn default_cross_domain() -> f64 { 0.2 }
fn default_regulator() -> f64 { 0.2 }

impl Default for LinchpinWeights {
    fn default() -> Self {
        Self {
            prognostic:   default_prognostic(),
            network_hub:  default_network_hub(),
            cross_domain: default_cross_domain(),
            regulator:    default_regulator(),
        }
    }
}

impl LinchpinWeights {
    /// Validate that all weights are non-negative and sum to ~1.0
    pub fn validate(&self) -> Result<()> {
        validate_array("linchpin weights", &self.as_array())
    }

    /// Renormalise weights so they sum to 1.0
    pub fn normalise(&mut self) {
        let sum: f64 = self.as_array().iter().sum();
        if sum > 0.0 {
            self.prognostic   /= sum;
            self.network_hub  /= sum;
            self.cross_domain /= sum;
            self.regulator    /= sum;
        }
    }

    pub fn as_array(&self) -> [f64; 4] {
        [self.prognostic, self.network_hub, self.cross_domain, self.regulator]
    }
}

/// Weights of the four centralities inside the network hub score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubWeights {
    #[serde(default = "default_quarter")]
    pub degree: f64,
    #[serde(default = "default_quarter")]
    pub betweenness: f64,
    #[serde(default = "default_quarter")]
    pub closeness: f64,
    #[serde(default = "default_quarter")]
    pub eigenvector: f64,
}

fn default_quarter() -> f64 { 0.25 }

impl Default for HubWeights {
    fn default() -> Self {
        Self {
            degree:      default_quarter(),
            betweenness: default_quarter(),
            closeness:   default_quarter(),
            eigenvector: default_quarter(),
        }
    }
}

impl HubWeights {
    pub fn validate(&self) -> Result<()> {
        validate_array("hub weights", &self.as_array())
    }

    pub fn as_array(&self) -> [f64; 4] {
        [self.degree, self.betweenness, self.closeness, self.eigenvector]
    }
}

fn validate_array(name: &str, weights: &[f64]) -> Result<()> {
    if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
        return Err(LinchpinError::Config(format!("{name} must be finite and non-negative: {weights:?}")));
    }
    let sum: f64 = weights.iter().sum();
    if (sum - 1.0).abs() > 1e-6 {
        return Err(LinchpinError::Config(format!("{name} must sum to 1.0, got {sum}")));
    }
    Ok(())
}
