use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use linchpin_common::{Compartment, LinchpinError, Result, Stage};
use linchpin_differential::{DifferentialOutput, GroupingStrategy};
use linchpin_io::InputPaths;
use linchpin_network::NetworkOutput;
use linchpin_pipeline::store::{
    stage1_file_name, CENTRALITY_FILE, DATA_QUALITY_FILE, DRUGGABILITY_FILE, EDGES_FILE, EVIDENCE_CARDS_FILE,
    MASTER_REGULATORS_FILE, MODULES_FILE, MODULE_EIGENGENES_FILE, MODULE_TRAITS_FILE, SCORES_FILE, SUMMARY_FILE,
};
use linchpin_pipeline::{
    AnalysisConfig, BroadcastSink, CancellationHandle, CsvResultStore, JobState, Pipeline, PipelineSummary,
    ProgressSink, ResultStore, StageEvent,
};
use linchpin_ranker::LinchpinOutput;
use linchpin_test_utils::{CohortBuilder, CONSTANT_GENE, SIGNAL_GENES};
use pretty_assertions::assert_eq;

fn config_for(out: &Path) -> AnalysisConfig {
    let mut config = AnalysisConfig::default();
    config.output.results_dir = out.to_path_buf();
    config
}

fn write_cohort(dir: &Path) {
    CohortBuilder::new().build().write_all(dir).unwrap();
}

fn read_table(path: &Path) -> Vec<HashMap<String, String>> {
    let mut reader = csv::Reader::from_path(path).unwrap();
    let headers = reader.headers().unwrap().clone();
    reader
        .records()
        .map(|r| {
            let r = r.unwrap();
            headers.iter().map(String::from).zip(r.iter().map(String::from)).collect()
        })
        .collect()
}

fn num(row: &HashMap<String, String>, col: &str) -> f64 {
    row[col].parse().unwrap()
}

#[tokio::test]
async fn full_run_writes_every_table() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_cohort(input.path());

    let sink = BroadcastSink::new(16);
    let mut rx = sink.subscribe();
    let pipeline = Pipeline::with_csv_store(config_for(output.path()))
        .unwrap()
        .with_sink(Arc::new(sink.clone()));
    let run = pipeline.run_from_paths(&InputPaths::from_dir(input.path())).await.unwrap();

    assert!(run.succeeded(), "job ended in {:?}: {:?}", run.job.state, run.job.error);
    assert_eq!(run.job.state, JobState::Completed);
    assert!(run.stage1.is_some() && run.stage2.is_some() && run.stage3.is_some());

    for c in Compartment::ALL {
        assert!(output.path().join(stage1_file_name(c)).exists());
    }
    for name in [
        CENTRALITY_FILE,
        EDGES_FILE,
        MODULES_FILE,
        MODULE_EIGENGENES_FILE,
        MODULE_TRAITS_FILE,
        SCORES_FILE,
        DRUGGABILITY_FILE,
        MASTER_REGULATORS_FILE,
        EVIDENCE_CARDS_FILE,
        DATA_QUALITY_FILE,
        SUMMARY_FILE,
    ] {
        assert!(output.path().join(name).exists(), "{name} missing");
    }

    let tumour = read_table(&output.path().join(stage1_file_name(Compartment::TumorCells)));
    for gene in SIGNAL_GENES {
        let row = tumour.iter().find(|r| r["gene_id"] == gene).unwrap();
        assert!(num(row, "adj_p_value") < 0.05, "{gene} not significant");
    }

    let centrality = read_table(&output.path().join(CENTRALITY_FILE));
    for gene in SIGNAL_GENES {
        let row = centrality.iter().find(|r| r["gene_id"] == gene).unwrap();
        assert!(num(row, "degree_centrality") > 0.0, "{gene} isolated");
    }

    let network = run.stage2.as_ref().unwrap();
    let traits = read_table(&output.path().join(MODULE_TRAITS_FILE));
    assert_eq!(traits.len(), network.module_traits.len());
    for row in &traits {
        let p = num(row, "p_value");
        assert!((0.0..=1.0).contains(&p));
        assert_eq!(row["significant"] == "true", p < 0.05);
    }
    let eigengenes = read_table(&output.path().join(MODULE_EIGENGENES_FILE));
    if !network.eigengenes.is_empty() {
        assert_eq!(eigengenes.len(), network.samples.len());
    }

    let mut stages = Vec::new();
    for _ in 0..3 {
        let event = rx.recv().await.unwrap();
        assert!(event.success);
        assert_eq!(event.job_id, run.job.id);
        stages.push(event.stage);
    }
    assert_eq!(stages, vec![Stage::Differential, Stage::Network, Stage::Linchpin]);

    let summary: PipelineSummary =
        serde_json::from_str(&std::fs::read_to_string(output.path().join(SUMMARY_FILE)).unwrap()).unwrap();
    assert_eq!(summary.state, JobState::Completed);
    assert_eq!(summary.stages.len(), 3);
    assert!(summary.stages.iter().all(|s| s.success));
}

#[tokio::test]
async fn empty_mutation_and_regulator_tables_give_zero_regulator_scores() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_cohort(input.path());
    std::fs::write(input.path().join(linchpin_io::MUTATIONS_FILE), "sample_id,gene,mutation_type,variant_class\n")
        .unwrap();
    std::fs::write(input.path().join(linchpin_io::REGULATORS_FILE), "gene_id,regulator_class\n").unwrap();

    let pipeline = Pipeline::with_csv_store(config_for(output.path())).unwrap();
    let run = pipeline.run_from_paths(&InputPaths::from_dir(input.path())).await.unwrap();

    assert!(run.succeeded());
    let stage3 = run.stage3.unwrap();
    assert!(!stage3.scores.is_empty());
    assert!(stage3.scores.iter().all(|s| s.regulator_score == 0.0));
    assert!(stage3.master_regulators.is_empty());
}

#[tokio::test]
async fn constant_gene_stays_out_of_the_network() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_cohort(input.path());

    let pipeline = Pipeline::with_csv_store(config_for(output.path())).unwrap();
    let run = pipeline.run_from_paths(&InputPaths::from_dir(input.path())).await.unwrap();
    assert!(run.succeeded());

    let stage1 = run.stage1.unwrap();
    let row = stage1
        .results_for(Compartment::StromalCells)
        .iter()
        .find(|r| r.gene_id == CONSTANT_GENE)
        .unwrap();
    assert_eq!(row.effect_size, 0.0);
    assert_eq!(row.p_value, 1.0);

    let stage2 = run.stage2.unwrap();
    assert!(stage2.universe.iter().all(|g| g.gene_id != CONSTANT_GENE));
    let stage3 = run.stage3.unwrap();
    assert!(stage3.scores.iter().all(|s| s.gene_id != CONSTANT_GENE));
}

#[tokio::test]
async fn output_is_identical_across_worker_counts() {
    let input = tempfile::tempdir().unwrap();
    write_cohort(input.path());
    let paths = InputPaths::from_dir(input.path());

    let mut dirs = Vec::new();
    for threads in [1, 4] {
        let output = tempfile::tempdir().unwrap();
        let mut config = config_for(output.path());
        config.execution.worker_threads = Some(threads);
        let run = Pipeline::with_csv_store(config).unwrap().run_from_paths(&paths).await.unwrap();
        assert!(run.succeeded());
        dirs.push(output);
    }

    let mut names: Vec<String> = std::fs::read_dir(dirs[0].path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| n != SUMMARY_FILE)
        .collect();
    names.sort();
    assert!(names.len() >= 10);
    for name in &names {
        let a = std::fs::read(dirs[0].path().join(name)).unwrap();
        let b = std::fs::read(dirs[1].path().join(name)).unwrap();
        assert!(a == b, "{name} differs between worker counts");
    }
}

#[tokio::test]
async fn stage_outputs_are_well_formed() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_cohort(input.path());

    let config = config_for(output.path());
    let threshold = config.network.correlation_threshold;
    let weights = config.scoring.weights.as_array();
    let run = Pipeline::with_csv_store(config)
        .unwrap()
        .run_from_paths(&InputPaths::from_dir(input.path()))
        .await
        .unwrap();
    assert!(run.succeeded());

    let stage2 = run.stage2.unwrap();
    for e in &stage2.edges {
        assert!(e.gene_a < e.gene_b);
        assert!(e.correlation.abs() >= threshold);
        assert!(e.correlation.abs() <= 1.0);
    }
    for c in &stage2.centrality {
        for v in [
            c.degree_centrality,
            c.betweenness_centrality,
            c.closeness_centrality,
            c.eigenvector_centrality,
        ] {
            assert!((0.0..=1.0).contains(&v), "{}: {v}", c.gene_id);
        }
    }

    let stage3 = run.stage3.unwrap();
    for (i, s) in stage3.scores.iter().enumerate() {
        assert_eq!(s.rank, i + 1);
        let components = [s.prognostic_score, s.network_hub_score, s.cross_domain_score, s.regulator_score];
        for v in components {
            assert!((0.0..=1.0).contains(&v));
        }
        let expected: f64 = components.iter().zip(weights.iter()).map(|(c, w)| c * w).sum();
        assert!((s.linchpin_score - expected).abs() < 1e-6);
    }
    for pair in stage3.scores.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        assert!(a.linchpin_score >= b.linchpin_score);
        if a.linchpin_score == b.linchpin_score {
            assert!(
                a.prognostic_score > b.prognostic_score
                    || (a.prognostic_score == b.prognostic_score && a.gene_id < b.gene_id)
            );
        }
    }
}

/// Delegates to the CSV store but refuses to persist the network.
struct FailingNetworkStore(CsvResultStore);

impl ResultStore for FailingNetworkStore {
    fn write_stage1(&self, output: &DifferentialOutput) -> Result<()> {
        self.0.write_stage1(output)
    }
    fn write_stage2(&self, _output: &NetworkOutput) -> Result<()> {
        Err(LinchpinError::Computation("disk full".into()))
    }
    fn write_stage3(&self, output: &LinchpinOutput) -> Result<()> {
        self.0.write_stage3(output)
    }
    fn write_data_quality(&self, flags: &[linchpin_common::DataQualityFlag]) -> Result<()> {
        self.0.write_data_quality(flags)
    }
    fn write_summary(&self, summary: &PipelineSummary) -> Result<()> {
        self.0.write_summary(summary)
    }
}

#[tokio::test]
async fn failing_stage_stops_the_run_and_keeps_earlier_outputs() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_cohort(input.path());

    let store = FailingNetworkStore(CsvResultStore::new(output.path()));
    let sink = BroadcastSink::new(16);
    let mut rx = sink.subscribe();
    let pipeline = Pipeline::new(config_for(output.path()), Arc::new(store))
        .unwrap()
        .with_sink(Arc::new(sink.clone()));
    let run = pipeline.run_from_paths(&InputPaths::from_dir(input.path())).await.unwrap();

    assert_eq!(run.job.state, JobState::Failed);
    assert_eq!(run.job.failed_stage, Some(Stage::Network));
    assert!(run.job.error.as_deref().unwrap_or_default().contains("disk full"));
    assert!(run.stage1.is_some());
    assert!(run.stage2.is_none() && run.stage3.is_none());

    assert!(output.path().join(stage1_file_name(Compartment::TumorCells)).exists());
    assert!(!output.path().join(SCORES_FILE).exists());
    assert!(output.path().join(SUMMARY_FILE).exists());

    let first = rx.recv().await.unwrap();
    assert!(first.success);
    let second = rx.recv().await.unwrap();
    assert!(!second.success);
    assert_eq!(second.stage, Stage::Network);
    assert_eq!(second.state, JobState::Failed);
}

#[tokio::test]
async fn cancelled_before_start_runs_nothing() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_cohort(input.path());

    let pipeline = Pipeline::with_csv_store(config_for(output.path())).unwrap();
    pipeline.cancellation_handle().cancel();
    let run = pipeline.run_from_paths(&InputPaths::from_dir(input.path())).await.unwrap();

    assert_eq!(run.job.state, JobState::Cancelled);
    assert!(run.stage1.is_none());
    assert!(run.job.error.is_some());
    assert!(!output.path().join(stage1_file_name(Compartment::TumorCells)).exists());
}

#[tokio::test]
async fn clinical_table_missing_a_sample_is_rejected() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_cohort(input.path());

    let clinical = input.path().join(linchpin_io::CLINICAL_FILE);
    let text = std::fs::read_to_string(&clinical).unwrap();
    let trimmed: Vec<&str> = text.lines().filter(|l| !l.starts_with("P007,")).collect();
    std::fs::write(&clinical, trimmed.join("\n") + "\n").unwrap();

    let pipeline = Pipeline::with_csv_store(config_for(output.path())).unwrap();
    let err = pipeline.run_from_paths(&InputPaths::from_dir(input.path())).await.unwrap_err();
    assert!(matches!(err, LinchpinError::InputValidation(_)), "{err}");
    assert!(!output.path().join(SUMMARY_FILE).exists());
}

/// Requests cancellation as soon as the first stage reports in.
struct CancelOnFirstEvent {
    cancel: CancellationHandle,
    seen: Mutex<Vec<StageEvent>>,
}

impl ProgressSink for CancelOnFirstEvent {
    fn emit(&self, event: StageEvent) {
        self.cancel.cancel();
        self.seen.lock().unwrap().push(event);
    }
}

#[tokio::test]
async fn cancellation_between_stages_keeps_stage1_outputs() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_cohort(input.path());

    let cancel = CancellationHandle::new();
    let sink = Arc::new(CancelOnFirstEvent { cancel: cancel.clone(), seen: Mutex::new(Vec::new()) });
    let pipeline = Pipeline::with_csv_store(config_for(output.path()))
        .unwrap()
        .with_cancellation(cancel)
        .with_sink(sink.clone());
    let run = pipeline.run_from_paths(&InputPaths::from_dir(input.path())).await.unwrap();

    let seen = sink.seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].state, JobState::Stage1Done);
    assert_eq!(run.job.state, JobState::Cancelled);
    assert!(run.job.error.as_deref().unwrap_or_default().contains(Stage::Network.as_str()));
    assert!(run.stage1.is_some());
    assert!(run.stage2.is_none() && run.stage3.is_none());
    assert_eq!(run.summary.stages.len(), 1);

    assert!(output.path().join(stage1_file_name(Compartment::TumorCells)).exists());
    assert!(!output.path().join(CENTRALITY_FILE).exists());
    assert!(output.path().join(SUMMARY_FILE).exists());
}

#[tokio::test]
async fn unknown_grouping_column_is_rejected_before_the_job() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_cohort(input.path());

    let mut config = config_for(output.path());
    config.differential.grouping = GroupingStrategy::Covariate {
        column: "no_such_column".into(),
        case_values: vec!["III".into()],
    };
    let pipeline = Pipeline::with_csv_store(config).unwrap();
    let err = pipeline.run_from_paths(&InputPaths::from_dir(input.path())).await.unwrap_err();
    assert!(matches!(err, LinchpinError::InputValidation(_)), "{err}");
    assert!(!output.path().join(stage1_file_name(Compartment::TumorCells)).exists());
    assert!(!output.path().join(SUMMARY_FILE).exists());
}
