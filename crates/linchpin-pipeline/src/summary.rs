//! Run summary written to `pipeline_summary.json`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use linchpin_common::{Compartment, Stage};
use linchpin_differential::{CompartmentStatus, DifferentialOutput, GeneHit};
use linchpin_network::{CrossDimensionalSummary, NetworkOutput};
use linchpin_ranker::LinchpinOutput;

use crate::config::AnalysisConfig;
use crate::job::{AnalysisJob, JobState};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: Stage,
    pub success: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompartmentReport {
    pub compartment: Compartment,
    pub status: CompartmentStatus,
    pub n_tested: usize,
    pub n_significant: usize,
    pub top_up: Vec<GeneHit>,
    pub top_down: Vec<GeneHit>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage1Summary {
    pub group_a_size: usize,
    pub group_b_size: usize,
    pub unassigned_genes: usize,
    pub compartments: Vec<CompartmentReport>,
}

impl From<&DifferentialOutput> for Stage1Summary {
    fn from(out: &DifferentialOutput) -> Self {
        let compartments = out
            .outcomes
            .values()
            .map(|o| {
                let (n_tested, n_significant, top_up, top_down) = match &o.summary {
                    Some(s) => (s.n_tested, s.n_significant, s.top_up.clone(), s.top_down.clone()),
                    None => (0, 0, Vec::new(), Vec::new()),
                };
                CompartmentReport {
                    compartment: o.compartment,
                    status: o.status.clone(),
                    n_tested,
                    n_significant,
                    top_up,
                    top_down,
                }
            })
            .collect();
        Self {
            group_a_size: out.group_a_size,
            group_b_size: out.group_b_size,
            unassigned_genes: out.unassigned_genes,
            compartments,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage2Summary {
    pub universe_size: usize,
    pub edges: usize,
    pub cross_dimensional_edges: usize,
    pub modules: usize,
    pub modularity: f64,
    /// Modules whose eigengene tracks os_time at the network alpha.
    pub survival_linked_modules: usize,
    pub cross_dimensional: Vec<CrossDimensionalSummary>,
}

impl From<&NetworkOutput> for Stage2Summary {
    fn from(out: &NetworkOutput) -> Self {
        Self {
            universe_size: out.universe.len(),
            edges: out.edges.len(),
            cross_dimensional_edges: out.cross_dimensional_edges().count(),
            modules: out.modules.len(),
            modularity: out.modularity,
            survival_linked_modules: out.module_traits.iter().filter(|t| t.significant).count(),
            cross_dimensional: out.cross_summary.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage3Summary {
    pub scored_genes: usize,
    pub druggable_genes: usize,
    pub master_regulators: usize,
    pub evidence_cards: usize,
    pub top_genes: Vec<String>,
}

impl Stage3Summary {
    pub fn new(out: &LinchpinOutput, top_n: usize) -> Self {
        Self {
            scored_genes: out.scores.len(),
            druggable_genes: out.scores.iter().filter(|s| s.druggable).count(),
            master_regulators: out.master_regulators.len(),
            evidence_cards: out.evidence_cards.len(),
            top_genes: out.scores.iter().take(top_n).map(|s| s.gene_id.clone()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSummary {
    pub job_id: Uuid,
    pub state: JobState,
    pub failed_stage: Option<Stage>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: u64,
    pub stages: Vec<StageReport>,
    pub stage1: Option<Stage1Summary>,
    pub stage2: Option<Stage2Summary>,
    pub stage3: Option<Stage3Summary>,
    pub data_quality_flags: usize,
    pub config: AnalysisConfig,
}

impl PipelineSummary {
    pub fn new(job: &AnalysisJob, config: &AnalysisConfig) -> Self {
        Self {
            job_id: job.id,
            state: job.state,
            failed_stage: None,
            error: None,
            started_at: job.created_at,
            finished_at: None,
            duration_ms: 0,
            stages: Vec::new(),
            stage1: None,
            stage2: None,
            stage3: None,
            data_quality_flags: 0,
            config: config.clone(),
        }
    }

    /// Copy the job's final state and timing.
    pub fn finish(&mut self, job: &AnalysisJob, flags: usize) {
        let now = Utc::now();
        self.state = job.state;
        self.failed_stage = job.failed_stage;
        self.error = job.error.clone();
        self.finished_at = Some(now);
        self.duration_ms = (now - self.started_at).num_milliseconds().max(0) as u64;
        self.data_quality_flags = flags;
    }
}
