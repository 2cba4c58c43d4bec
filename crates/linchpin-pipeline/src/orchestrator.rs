//! Pipeline orchestrator.
//!
//! Runs the three stages strictly in order for one job:
//!   1. Compartment differential analysis
//!   2. Correlation network and centrality
//!   3. Linchpin scoring and druggability
//!
//! Each stage runs on the blocking pool (inside the configured rayon pool,
//! if any), persists its tables, then advances the job state and emits a
//! stage event. A failing stage marks the job failed and stops the run;
//! earlier outputs stay on disk. Cancellation is honoured between stages.

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, instrument, warn};

use linchpin_common::{DataQualityFlag, LinchpinError, Result, Stage};
use linchpin_differential::{derive_groups, run_differential, DifferentialOutput};
use linchpin_io::{load_inputs, InputBundle, InputPaths};
use linchpin_network::{run_network, NetworkOutput};
use linchpin_ranker::{run_linchpin, LinchpinInputs, LinchpinOutput};

use crate::config::AnalysisConfig;
use crate::events::{CancellationHandle, NoopSink, ProgressSink, StageEvent};
use crate::job::{AnalysisJob, JobState};
use crate::store::{CsvResultStore, ResultStore};
use crate::summary::{PipelineSummary, Stage1Summary, Stage2Summary, Stage3Summary, StageReport};

/// Outcome of one run. Stage outputs are present for every stage that
/// completed.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub job: AnalysisJob,
    pub summary: PipelineSummary,
    pub stage1: Option<Arc<DifferentialOutput>>,
    pub stage2: Option<Arc<NetworkOutput>>,
    pub stage3: Option<Arc<LinchpinOutput>>,
    pub flags: Vec<DataQualityFlag>,
}

impl PipelineRun {
    pub fn succeeded(&self) -> bool {
        self.job.state == JobState::Completed
    }
}

pub struct Pipeline {
    config: Arc<AnalysisConfig>,
    store: Arc<dyn ResultStore>,
    sink: Arc<dyn ProgressSink>,
    cancel: CancellationHandle,
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl Pipeline {
    /// Validates the configuration and builds the worker pool.
    pub fn new(config: AnalysisConfig, store: Arc<dyn ResultStore>) -> Result<Self> {
        config.validate()?;
        let pool = match config.execution.worker_threads {
            Some(threads) => Some(Arc::new(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(|i| format!("linchpin-worker-{i}"))
                    .build()
                    .map_err(|e| LinchpinError::Config(format!("cannot build worker pool: {e}")))?,
            )),
            None => None,
        };
        Ok(Self {
            config: Arc::new(config),
            store,
            sink: Arc::new(NoopSink),
            cancel: CancellationHandle::new(),
            pool,
        })
    }

    /// Pipeline writing CSV/JSON files to `config.output.results_dir`.
    pub fn with_csv_store(config: AnalysisConfig) -> Result<Self> {
        let store = CsvResultStore::new(&config.output.results_dir)
            .with_correlation_matrix(config.output.write_correlation_matrix);
        Self::new(config, Arc::new(store))
    }

    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationHandle) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_handle(&self) -> CancellationHandle {
        self.cancel.clone()
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Load and validate inputs, then run. Input validation errors,
    /// including an unusable contrast grouping, are returned before any
    /// stage starts.
    pub async fn run_from_paths(&self, paths: &InputPaths) -> Result<PipelineRun> {
        let paths = paths.clone();
        let inputs = tokio::task::spawn_blocking(move || load_inputs(&paths))
            .await
            .map_err(|e| LinchpinError::Computation(format!("input loading task failed: {e}")))??;
        self.run(inputs).await
    }

    /// Run all stages. Stage failures end in a `failed` job, not an `Err`;
    /// errors are returned for a contrast that cannot be formed from the
    /// inputs (before the job exists) and for illegal state transitions.
    #[instrument(skip(self, inputs), fields(genes = inputs.expression.n_genes(), samples = inputs.expression.n_samples()))]
    pub async fn run(&self, inputs: InputBundle) -> Result<PipelineRun> {
        derive_groups(&inputs.expression, &inputs.clinical, &self.config.differential.grouping)?;
        let inputs = Arc::new(inputs);
        let job = AnalysisJob::new();
        info!(job_id = %job.id, "Starting linchpin pipeline");

        let mut run = PipelineRun {
            summary: PipelineSummary::new(&job, &self.config),
            job,
            stage1: None,
            stage2: None,
            stage3: None,
            flags: inputs.flags.clone(),
        };

        // ── Stage 1 ──
        if self.cancelled(&mut run, Stage::Differential)? {
            return Ok(self.finish(run).await);
        }
        let stage1 = {
            let (inputs, config, store) = (inputs.clone(), self.config.clone(), self.store.clone());
            self.run_stage(&mut run, Stage::Differential, JobState::Stage1Running, JobState::Stage1Done, move || {
                let out = run_differential(&inputs.expression, &inputs.clinical, &inputs.compartments, &config.differential)?;
                store.write_stage1(&out)?;
                Ok(out)
            })
            .await?
        };
        let Some(stage1) = stage1 else {
            return Ok(self.finish(run).await);
        };
        run.flags.extend(stage1.flags.iter().cloned());
        run.summary.stage1 = Some(Stage1Summary::from(stage1.as_ref()));
        run.stage1 = Some(stage1.clone());

        // ── Stage 2 ──
        if self.cancelled(&mut run, Stage::Network)? {
            return Ok(self.finish(run).await);
        }
        let stage2 = {
            let (inputs, config, store, s1) = (inputs.clone(), self.config.clone(), self.store.clone(), stage1.clone());
            self.run_stage(&mut run, Stage::Network, JobState::Stage2Running, JobState::Stage2Done, move || {
                let out = run_network(s1.all_results(), &inputs.expression, &inputs.clinical, &config.network);
                store.write_stage2(&out)?;
                Ok(out)
            })
            .await?
        };
        let Some(stage2) = stage2 else {
            return Ok(self.finish(run).await);
        };
        run.flags.extend(stage2.flags.iter().cloned());
        run.summary.stage2 = Some(Stage2Summary::from(stage2.as_ref()));
        run.stage2 = Some(stage2.clone());

        // ── Stage 3 ──
        if self.cancelled(&mut run, Stage::Linchpin)? {
            return Ok(self.finish(run).await);
        }
        let stage3 = {
            let (inputs, config, store) = (inputs.clone(), self.config.clone(), self.store.clone());
            let (s1, s2) = (stage1.clone(), stage2.clone());
            self.run_stage(&mut run, Stage::Linchpin, JobState::Stage3Running, JobState::Completed, move || {
                let stage_inputs = LinchpinInputs {
                    differential: &s1,
                    network: &s2,
                    expression: &inputs.expression,
                    clinical: &inputs.clinical,
                    mutations: &inputs.mutations,
                    regulators: &inputs.regulators,
                    druggability: &inputs.druggable,
                };
                let out = run_linchpin(&stage_inputs, &config.scoring)?;
                store.write_stage3(&out)?;
                Ok(out)
            })
            .await?
        };
        if let Some(stage3) = stage3 {
            run.flags.extend(stage3.flags.iter().cloned());
            run.summary.stage3 = Some(Stage3Summary::new(&stage3, self.config.output.summary_top_genes));
            run.stage3 = Some(stage3);
        }

        Ok(self.finish(run).await)
    }

    /// Cancel at a stage boundary if requested. Returns true when cancelled.
    fn cancelled(&self, run: &mut PipelineRun, next: Stage) -> Result<bool> {
        if !self.cancel.is_cancelled() {
            return Ok(false);
        }
        run.job.transition(JobState::Cancelled)?;
        run.job.error = Some(LinchpinError::Cancelled(next.to_string()).to_string());
        warn!(job_id = %run.job.id, before = %next, "Pipeline cancelled");
        Ok(true)
    }

    /// Execute one stage body on the blocking pool and record its outcome.
    /// `Ok(None)` means the stage failed and the job is now `failed`.
    async fn run_stage<T, F>(
        &self,
        run: &mut PipelineRun,
        stage: Stage,
        running: JobState,
        done: JobState,
        body: F,
    ) -> Result<Option<Arc<T>>>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        run.job.transition(running)?;
        info!(job_id = %run.job.id, stage = %stage, "Stage started");
        let t0 = Instant::now();

        let pool = self.pool.clone();
        let outcome = tokio::task::spawn_blocking(move || match pool {
            Some(pool) => pool.install(body),
            None => body(),
        })
        .await
        .unwrap_or_else(|e| {
            Err(LinchpinError::Stage {
                stage: stage.to_string(),
                message: format!("worker task failed: {e}"),
            })
        });
        let duration_ms = t0.elapsed().as_millis() as u64;

        match outcome {
            Ok(value) => {
                run.job.transition(done)?;
                run.summary.stages.push(StageReport { stage, success: true, error: None, duration_ms });
                info!(job_id = %run.job.id, stage = %stage, duration_ms, "Stage finished");
                self.sink.emit(StageEvent::completed(run.job.id, stage, run.job.state));
                Ok(Some(Arc::new(value)))
            }
            Err(e) => {
                let message = e.to_string();
                warn!(job_id = %run.job.id, stage = %stage, error = %message, "Stage failed");
                run.job.fail(message.clone())?;
                run.summary.stages.push(StageReport {
                    stage,
                    success: false,
                    error: Some(message.clone()),
                    duration_ms,
                });
                self.sink.emit(StageEvent::failed(run.job.id, stage, message));
                Ok(None)
            }
        }
    }

    /// Persist flags and the summary. Write failures here are logged only;
    /// the job state is already final.
    async fn finish(&self, mut run: PipelineRun) -> PipelineRun {
        run.summary.finish(&run.job, run.flags.len());
        let store = self.store.clone();
        let flags = run.flags.clone();
        let summary = run.summary.clone();
        let written = tokio::task::spawn_blocking(move || {
            store.write_data_quality(&flags)?;
            store.write_summary(&summary)
        })
        .await;
        match written {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Failed to write run summary"),
            Err(e) => warn!(error = %e, "Summary writer task failed"),
        }
        info!(
            job_id = %run.job.id,
            state = %run.job.state,
            flags = run.flags.len(),
            duration_ms = run.summary.duration_ms,
            "Pipeline finished"
        );
        run
    }
}
