//! linchpin-common — Shared types, errors, and reference data used across all Linchpin crates.

pub mod error;
pub mod entities;
pub mod quality;
pub mod reference;

// Re-export commonly used types
pub use entities::{
    CentralityRecord, ClinicalTable, Compartment, CompartmentAssignment, DifferentialResult,
    ExpressionMatrix, LinchpinScore, MutationRecord, NetworkEdge, Sample,
};
pub use error::{LinchpinError, Result};
pub use quality::{DataQualityFlag, QualityKind, Stage};
