//! linchpin-io — Tabular input loading with validation, and deterministic
//! CSV / JSON output writers.

pub mod inputs;
pub mod readers;
pub mod writers;

pub use inputs::{load_inputs, InputBundle, InputPaths};
pub use readers::Loaded;
pub use writers::{format_float, write_json, TableWriter};

/// Canonical input file names inside an input directory.
pub const EXPRESSION_FILE: &str = "expression.csv";
pub const CLINICAL_FILE: &str = "clinical.csv";
pub const MUTATIONS_FILE: &str = "mutations.csv";
pub const COMPARTMENTS_FILE: &str = "compartments.csv";
pub const DRUGGABLE_FILE: &str = "druggable_targets.csv";
pub const REGULATORS_FILE: &str = "regulators.csv";
