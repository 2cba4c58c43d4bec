//! Analysis configuration.
//! Loadable from YAML or TOML; every field has a named default.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use linchpin_common::{LinchpinError, Result};
use linchpin_differential::DifferentialConfig;
use linchpin_network::NetworkConfig;
use linchpin_ranker::ScoringConfig;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub differential: DifferentialConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,
    /// The full matrix grows quadratically with the universe.
    #[serde(default = "bool_true")]
    pub write_correlation_matrix: bool,
    /// Genes listed by name in `pipeline_summary.json`.
    #[serde(default = "default_summary_top_genes")]
    pub summary_top_genes: usize,
}

fn default_results_dir() -> PathBuf { PathBuf::from("results") }
fn bool_true() -> bool { true }
fn default_summary_top_genes() -> usize { 10 }

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            results_dir: default_results_dir(),
            write_correlation_matrix: bool_true(),
            summary_top_genes: default_summary_top_genes(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Size of the rayon pool used by the stages. None uses rayon's default.
    #[serde(default)]
    pub worker_threads: Option<usize>,
}

fn in_unit_interval(name: &str, v: f64) -> Result<()> {
    if v.is_finite() && v > 0.0 && v <= 1.0 {
        Ok(())
    } else {
        Err(LinchpinError::Config(format!("{name} must be in (0, 1], got {v}")))
    }
}

fn positive(name: &str, v: usize) -> Result<()> {
    if v == 0 {
        Err(LinchpinError::Config(format!("{name} must be positive")))
    } else {
        Ok(())
    }
}

impl AnalysisConfig {
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        serde_yaml::from_str(s).map_err(|e| LinchpinError::Config(format!("invalid YAML config: {e}")))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| LinchpinError::Config(format!("invalid TOML config: {e}")))
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| LinchpinError::Config(e.to_string()))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| LinchpinError::Config(e.to_string()))
    }

    /// Load by extension: `.yaml`/`.yml` as YAML, anything else as TOML.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = if is_yaml(path) {
            Self::from_yaml_str(&content)?
        } else {
            Self::from_toml_str(&content)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Write in the format implied by the extension.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = if is_yaml(path) { self.to_yaml()? } else { self.to_toml()? };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let d = &self.differential;
        in_unit_interval("differential.alpha", d.alpha)?;
        if d.min_samples_per_group < 2 {
            return Err(LinchpinError::Config(format!(
                "differential.min_samples_per_group must be at least 2, got {}",
                d.min_samples_per_group
            )));
        }
        positive("differential.parametric_min_group_size", d.parametric_min_group_size)?;

        let n = &self.network;
        in_unit_interval("network.alpha", n.alpha)?;
        in_unit_interval("network.correlation_threshold", n.correlation_threshold)?;
        positive("network.top_k_per_compartment", n.top_k_per_compartment)?;
        if let Some(cap) = n.max_universe {
            positive("network.max_universe", cap)?;
        }
        positive("network.eigenvector_max_iter", n.eigenvector_max_iter)?;
        positive("network.min_module_size", n.min_module_size)?;
        if !(n.eigenvector_tolerance.is_finite() && n.eigenvector_tolerance > 0.0) {
            return Err(LinchpinError::Config(format!(
                "network.eigenvector_tolerance must be positive, got {}",
                n.eigenvector_tolerance
            )));
        }
        if !(n.module_resolution.is_finite() && n.module_resolution > 0.0) {
            return Err(LinchpinError::Config(format!(
                "network.module_resolution must be positive, got {}",
                n.module_resolution
            )));
        }

        self.scoring.validate()?;

        if let Some(threads) = self.execution.worker_threads {
            positive("execution.worker_threads", threads)?;
        }
        Ok(())
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase()).as_deref(),
        Some("yaml") | Some("yml")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use linchpin_differential::GroupingStrategy;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = AnalysisConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.network.correlation_threshold, 0.4);
        assert_eq!(cfg.scoring.weights.prognostic, 0.3);
        assert_eq!(cfg.output.results_dir, PathBuf::from("results"));
    }

    #[test]
    fn test_partial_yaml() {
        let cfg = AnalysisConfig::from_yaml_str(
            "network:\n  correlation_threshold: 0.6\ndifferential:\n  grouping:\n    strategy: event_status\n",
        )
        .unwrap();
        assert_eq!(cfg.network.correlation_threshold, 0.6);
        assert_eq!(cfg.network.top_k_per_compartment, 10);
        assert_eq!(cfg.differential.grouping, GroupingStrategy::EventStatus);
    }

    #[test]
    fn test_toml_and_yaml_agree() {
        let cfg = AnalysisConfig::default();
        let from_yaml = AnalysisConfig::from_yaml_str(&cfg.to_yaml().unwrap()).unwrap();
        let from_toml = AnalysisConfig::from_toml_str(&cfg.to_toml().unwrap()).unwrap();
        assert_eq!(from_yaml, cfg);
        assert_eq!(from_toml, cfg);
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut cfg = AnalysisConfig::default();
        cfg.network.correlation_threshold = 1.5;
        assert!(cfg.validate().is_err());

        let mut cfg = AnalysisConfig::default();
        cfg.scoring.weights.network_hub = -0.3;
        assert!(cfg.validate().is_err());

        let mut cfg = AnalysisConfig::default();
        cfg.network.top_k_per_compartment = 0;
        assert!(matches!(cfg.validate(), Err(LinchpinError::Config(_))));

        let mut cfg = AnalysisConfig::default();
        cfg.network.module_resolution = 0.0;
        assert!(matches!(cfg.validate(), Err(LinchpinError::Config(_))));
    }

    #[test]
    fn test_save_and_load_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = AnalysisConfig::default();
        cfg.execution.worker_threads = Some(2);
        for name in ["linchpin.yaml", "linchpin.toml"] {
            let path = dir.path().join(name);
            cfg.save(&path).unwrap();
            assert_eq!(AnalysisConfig::load(&path).unwrap(), cfg);
        }
    }
}
