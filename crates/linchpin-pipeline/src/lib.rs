//! linchpin-pipeline — Configuration, job state machine and orchestration of
//! the three analysis stages.

pub mod config;
pub mod events;
pub mod job;
pub mod orchestrator;
pub mod store;
pub mod summary;

pub use config::{AnalysisConfig, ExecutionConfig, OutputConfig};
pub use events::{BroadcastSink, CancellationHandle, NoopSink, ProgressSink, StageEvent};
pub use job::{AnalysisJob, JobState};
pub use orchestrator::{Pipeline, PipelineRun};
pub use store::{CsvResultStore, ResultStore};
pub use summary::PipelineSummary;
