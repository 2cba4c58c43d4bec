//! linchpin-differential — Stage 1: per-compartment differential expression.
//!
//! Splits the cohort into two contrast groups, tests every assigned gene
//! within its compartment and corrects for multiple testing per compartment.

pub mod config;
pub mod engine;
pub mod grouping;
pub mod summary;

pub use config::{DifferentialConfig, GroupingStrategy, TestMethod};
pub use engine::{run_differential, CompartmentOutcome, CompartmentStatus, DifferentialOutput};
pub use grouping::{derive_groups, GroupSplit};
pub use summary::{CompartmentSummary, GeneHit};
