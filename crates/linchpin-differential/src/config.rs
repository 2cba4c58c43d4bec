//! Stage 1 configuration.

use serde::{Deserialize, Serialize};

use linchpin_stats::PAdjustMethod;

/// How samples are split into the two contrast groups.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum GroupingStrategy {
    /// `os_time` strictly below the cohort median is group A.
    #[default]
    SurvivalMedian,
    /// Observed event is group A.
    EventStatus,
    /// Covariate value in `case_values` is group A; other non-empty values
    /// are group B; samples without the covariate are excluded.
    Covariate {
        column: String,
        case_values: Vec<String>,
    },
    /// Listed samples are group A, all others group B.
    Explicit { group_a: Vec<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestMethod {
    #[default]
    Welch,
    MannWhitney,
    /// Welch when both groups reach `parametric_min_group_size`.
    Auto,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifferentialConfig {
    #[serde(default)]
    pub grouping: GroupingStrategy,

    #[serde(default)]
    pub test_method: TestMethod,

    #[serde(default)]
    pub correction: PAdjustMethod,

    /// Significance level on the adjusted p-value.
    #[serde(default = "default_alpha")]
    pub alpha: f64,

    /// A compartment with fewer samples than this in either group is skipped.
    #[serde(default = "default_min_samples_per_group")]
    pub min_samples_per_group: usize,

    #[serde(default = "default_parametric_min_group_size")]
    pub parametric_min_group_size: usize,

    /// Up- and down-regulated genes listed per compartment summary.
    #[serde(default = "default_summary_top_n")]
    pub summary_top_n: usize,
}

fn default_alpha() -> f64 { 0.05 }
fn default_min_samples_per_group() -> usize { 2 }
fn default_parametric_min_group_size() -> usize { 8 }
fn default_summary_top_n() -> usize { 5 }

impl Default for DifferentialConfig {
    fn default() -> Self {
        Self {
            grouping: GroupingStrategy::default(),
            test_method: TestMethod::default(),
            correction: PAdjustMethod::default(),
            alpha: default_alpha(),
            min_samples_per_group: default_min_samples_per_group(),
            parametric_min_group_size: default_parametric_min_group_size(),
            summary_top_n: default_summary_top_n(),
        }
    }
}
