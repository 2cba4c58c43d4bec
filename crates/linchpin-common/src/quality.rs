//! Data-quality annotations.
//!
//! Row-local failures (one gene, one compartment, one malformed record) never
//! abort a stage; they are recorded here and travel with the stage output.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::entities::Compartment;

/// Pipeline stage identifiers, as used in events and flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Input,
    Differential,
    Network,
    Linchpin,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Input        => "input",
            Stage::Differential => "stage1_differential",
            Stage::Network      => "stage2_network",
            Stage::Linchpin     => "stage3_linchpin",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityKind {
    MalformedRow,
    UnknownSample,
    UnassignedGene,
    InsufficientObservations,
    InsufficientSamples,
    EmptyUniverse,
    EigenvectorNotConverged,
    MissingSurvival,
    ComputationFailed,
}

impl QualityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityKind::MalformedRow             => "malformed_row",
            QualityKind::UnknownSample            => "unknown_sample",
            QualityKind::UnassignedGene           => "unassigned_gene",
            QualityKind::InsufficientObservations => "insufficient_observations",
            QualityKind::InsufficientSamples      => "insufficient_samples",
            QualityKind::EmptyUniverse            => "empty_universe",
            QualityKind::EigenvectorNotConverged  => "eigenvector_not_converged",
            QualityKind::MissingSurvival          => "missing_survival",
            QualityKind::ComputationFailed        => "computation_failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataQualityFlag {
    pub stage: Stage,
    pub gene_id: Option<String>,
    pub compartment: Option<Compartment>,
    pub kind: QualityKind,
    pub message: String,
}

impl DataQualityFlag {
    pub fn new(stage: Stage, kind: QualityKind, message: impl Into<String>) -> Self {
        Self {
            stage,
            gene_id: None,
            compartment: None,
            kind,
            message: message.into(),
        }
    }

    pub fn for_gene(mut self, gene: impl Into<String>) -> Self {
        self.gene_id = Some(gene.into());
        self
    }

    pub fn in_compartment(mut self, compartment: Compartment) -> Self {
        self.compartment = Some(compartment);
        self
    }
}

/// Canonical flag order: stage, gene, compartment, kind, message.
pub fn sort_flags(flags: &mut [DataQualityFlag]) {
    flags.sort_by(|a, b| {
        a.stage
            .cmp(&b.stage)
            .then_with(|| a.gene_id.cmp(&b.gene_id))
            .then_with(|| a.compartment.cmp(&b.compartment))
            .then_with(|| a.kind.cmp(&b.kind))
            .then_with(|| a.message.cmp(&b.message))
    });
}
