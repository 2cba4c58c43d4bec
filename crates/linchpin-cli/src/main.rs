//! `linchpin` command-line runner.
//!
//! Reads linchpin.toml from the current directory or the path in the
//! LINCHPIN_CONFIG env var (or `--config`); missing files fall back to the
//! built-in defaults.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use linchpin_differential::derive_groups;
use linchpin_io::{load_inputs, InputPaths};
use linchpin_pipeline::{AnalysisConfig, BroadcastSink, JobState, Pipeline};

const DEFAULT_CONFIG_FILE: &str = "linchpin.toml";

#[derive(Parser)]
#[command(name = "linchpin", version)]
#[command(about = "Rank cross-compartment linchpin genes from tumour expression and survival data")]
struct Cli {
    /// Configuration file (TOML or YAML)
    #[arg(short, long, env = "LINCHPIN_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run all three stages and write the result tables
    Run {
        #[command(flatten)]
        inputs: InputArgs,

        /// Results directory (overrides output.results_dir)
        #[arg(short, long, value_name = "DIR")]
        out: Option<PathBuf>,

        /// Minimum |r| for a network edge
        #[arg(long, value_name = "R")]
        threshold: Option<f64>,

        /// Worker threads for the numeric stages
        #[arg(long)]
        threads: Option<usize>,
    },
    /// Load and cross-check the inputs and the contrast without running any stage
    Validate {
        #[command(flatten)]
        inputs: InputArgs,
    },
    /// Write the default configuration (format chosen by extension)
    InitConfig {
        path: PathBuf,
    },
}

#[derive(Args)]
struct InputArgs {
    /// Directory holding the input tables under their canonical names
    #[arg(short = 'd', long, value_name = "DIR")]
    input_dir: Option<PathBuf>,

    /// Gene x sample expression matrix (CSV/TSV)
    #[arg(short, long)]
    expression: Option<PathBuf>,

    /// Clinical table with sample_id, os_time, os_status
    #[arg(long)]
    clinical: Option<PathBuf>,

    #[arg(long)]
    mutations: Option<PathBuf>,

    /// Gene to compartment assignment; defaults to the built-in table
    #[arg(long)]
    compartments: Option<PathBuf>,

    #[arg(long)]
    druggable: Option<PathBuf>,

    #[arg(long)]
    regulators: Option<PathBuf>,
}

impl InputArgs {
    fn into_paths(self) -> anyhow::Result<InputPaths> {
        let mut paths = match (&self.input_dir, &self.expression, &self.clinical) {
            (Some(dir), _, _) => InputPaths::from_dir(dir),
            (None, Some(expression), Some(clinical)) => InputPaths::new(expression, clinical),
            _ => bail!("either --input-dir or both --expression and --clinical are required"),
        };
        if let Some(p) = self.expression {
            paths.expression = p;
        }
        if let Some(p) = self.clinical {
            paths.clinical = p;
        }
        paths.mutations = self.mutations.or(paths.mutations);
        paths.compartments = self.compartments.or(paths.compartments);
        paths.druggable = self.druggable.or(paths.druggable);
        paths.regulators = self.regulators.or(paths.regulators);
        Ok(paths)
    }
}

fn load_config(explicit: Option<&Path>) -> anyhow::Result<AnalysisConfig> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            if !default.exists() {
                info!("No {DEFAULT_CONFIG_FILE} found, using default configuration");
                return Ok(AnalysisConfig::default());
            }
            default
        }
    };
    let config = AnalysisConfig::load(&path).with_context(|| format!("loading config {}", path.display()))?;
    info!(path = %path.display(), "Configuration loaded");
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("linchpin=debug,info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::InitConfig { path } => {
            AnalysisConfig::default()
                .save(&path)
                .with_context(|| format!("writing {}", path.display()))?;
            println!("Wrote default configuration to {}", path.display());
            Ok(())
        }
        Command::Validate { inputs } => {
            let config = load_config(cli.config.as_deref())?;
            let paths = inputs.into_paths()?;
            let bundle = tokio::task::spawn_blocking(move || load_inputs(&paths))
                .await
                .context("input loader task failed")??;
            println!(
                "{} genes x {} samples, {} clinical records, {} mutations, {} genes with a compartment, {} data-quality flags",
                bundle.expression.n_genes(),
                bundle.expression.n_samples(),
                bundle.clinical.len(),
                bundle.mutations.len(),
                bundle.compartments.len(),
                bundle.flags.len(),
            );
            let split = derive_groups(&bundle.expression, &bundle.clinical, &config.differential.grouping)
                .context("grouping does not give a usable contrast")?;
            println!(
                "contrast: {} vs {} samples ({} excluded)",
                split.group_a.len(),
                split.group_b.len(),
                split.excluded
            );
            Ok(())
        }
        Command::Run { inputs, out, threshold, threads } => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(dir) = out {
                config.output.results_dir = dir;
            }
            if let Some(r) = threshold {
                config.network.correlation_threshold = r;
            }
            if threads.is_some() {
                config.execution.worker_threads = threads;
            }
            let paths = inputs.into_paths()?;
            run(config, paths).await
        }
    }
}

async fn run(config: AnalysisConfig, paths: InputPaths) -> anyhow::Result<()> {
    let results_dir = config.output.results_dir.clone();
    let sink = BroadcastSink::new(16);
    let mut events = sink.subscribe();
    let pipeline = Pipeline::with_csv_store(config)
        .context("invalid configuration")?
        .with_sink(Arc::new(sink));

    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event.error {
                None => info!(stage = %event.stage, state = %event.state, "Stage complete"),
                Some(error) => warn!(stage = %event.stage, %error, "Stage failed"),
            }
        }
    });

    let cancel = pipeline.cancellation_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling at the next stage boundary");
            cancel.cancel();
        }
    });

    std::fs::create_dir_all(&results_dir)
        .with_context(|| format!("creating results directory {}", results_dir.display()))?;
    let run = pipeline.run_from_paths(&paths).await.context("input validation failed")?;

    if let Some(stage3) = &run.stage3 {
        println!("{:>4}  {:<16} {:<16} {:>8}  druggable", "rank", "gene", "compartment", "score");
        for s in stage3.scores.iter().take(pipeline.config().output.summary_top_genes) {
            println!(
                "{:>4}  {:<16} {:<16} {:>8.4}  {}",
                s.rank,
                s.gene_id,
                s.compartment.as_str(),
                s.linchpin_score,
                s.druggable
            );
        }
    }
    println!("{}", serde_json::to_string_pretty(&run.summary.stages)?);
    println!("Results written to {}", results_dir.display());

    match run.job.state {
        JobState::Completed => Ok(()),
        state => bail!(
            "job {} ended in state {}: {}",
            run.job.id,
            state,
            run.job.error.as_deref().unwrap_or("no error recorded")
        ),
    }
}
