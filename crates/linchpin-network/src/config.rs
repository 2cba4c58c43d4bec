//! Stage 2 configuration.

use serde::{Deserialize, Serialize};

use linchpin_stats::CorrelationMethod;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Adjusted p-value cut-off for universe membership.
    #[serde(default = "default_alpha")]
    pub alpha: f64,

    #[serde(default = "default_top_k")]
    pub top_k_per_compartment: usize,

    /// Optional global cap on the combined universe.
    #[serde(default)]
    pub max_universe: Option<usize>,

    #[serde(default)]
    pub correlation_method: CorrelationMethod,

    /// Edges are kept when |r| reaches this value.
    #[serde(default = "default_correlation_threshold")]
    pub correlation_threshold: f64,

    #[serde(default = "default_eigenvector_max_iter")]
    pub eigenvector_max_iter: usize,

    #[serde(default = "default_eigenvector_tolerance")]
    pub eigenvector_tolerance: f64,

    #[serde(default = "default_min_module_size")]
    pub min_module_size: usize,

    /// Louvain resolution; larger values give smaller modules.
    #[serde(default = "default_module_resolution")]
    pub module_resolution: f64,
}

fn default_alpha() -> f64 { 0.05 }
fn default_top_k() -> usize { 10 }
fn default_correlation_threshold() -> f64 { 0.4 }
fn default_eigenvector_max_iter() -> usize { 1000 }
fn default_eigenvector_tolerance() -> f64 { 1e-6 }
fn default_min_module_size() -> usize { 3 }
fn default_module_resolution() -> f64 { 1.0 }

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            alpha: default_alpha(),
            top_k_per_compartment: default_top_k(),
            max_universe: None,
            correlation_method: CorrelationMethod::default(),
            correlation_threshold: default_correlation_threshold(),
            eigenvector_max_iter: default_eigenvector_max_iter(),
            eigenvector_tolerance: default_eigenvector_tolerance(),
            min_module_size: default_min_module_size(),
            module_resolution: default_module_resolution(),
        }
    }
}
