//! Loading and cross-validating a full set of analysis inputs.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use linchpin_common::reference::{self, DruggableTargets, RegulatorReference};
use linchpin_common::{
    ClinicalTable, CompartmentAssignment, DataQualityFlag, ExpressionMatrix, LinchpinError,
    MutationRecord, QualityKind, Result, Stage,
};

use crate::readers;

/// Locations of the input tables. Optional tables fall back to the built-in
/// reference data (or an empty mutation table) when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputPaths {
    pub expression: PathBuf,
    pub clinical: PathBuf,
    #[serde(default)]
    pub mutations: Option<PathBuf>,
    #[serde(default)]
    pub compartments: Option<PathBuf>,
    #[serde(default)]
    pub druggable: Option<PathBuf>,
    #[serde(default)]
    pub regulators: Option<PathBuf>,
}

impl InputPaths {
    pub fn new(expression: impl Into<PathBuf>, clinical: impl Into<PathBuf>) -> Self {
        Self {
            expression: expression.into(),
            clinical: clinical.into(),
            mutations: None,
            compartments: None,
            druggable: None,
            regulators: None,
        }
    }

    /// Canonical file names inside `dir`; optional tables only if present.
    pub fn from_dir(dir: &Path) -> Self {
        let optional = |name: &str| Some(dir.join(name)).filter(|p| p.exists());
        Self {
            expression: dir.join(crate::EXPRESSION_FILE),
            clinical: dir.join(crate::CLINICAL_FILE),
            mutations: optional(crate::MUTATIONS_FILE),
            compartments: optional(crate::COMPARTMENTS_FILE),
            druggable: optional(crate::DRUGGABLE_FILE),
            regulators: optional(crate::REGULATORS_FILE),
        }
    }
}

/// Validated inputs ready for Stage 1.
#[derive(Debug, Clone)]
pub struct InputBundle {
    pub expression: ExpressionMatrix,
    pub clinical: ClinicalTable,
    pub mutations: Vec<MutationRecord>,
    pub compartments: CompartmentAssignment,
    pub druggable: DruggableTargets,
    pub regulators: RegulatorReference,
    pub flags: Vec<DataQualityFlag>,
}

impl InputBundle {
    /// Cross-table checks: every expression sample needs a clinical record
    /// (fatal), and mutations of unknown samples are dropped with a flag.
    pub fn validated(
        expression: ExpressionMatrix,
        clinical: ClinicalTable,
        mutations: Vec<MutationRecord>,
        compartments: CompartmentAssignment,
        druggable: DruggableTargets,
        regulators: RegulatorReference,
        mut flags: Vec<DataQualityFlag>,
    ) -> Result<Self> {
        if expression.n_genes() == 0 || expression.n_samples() == 0 {
            return Err(LinchpinError::InputValidation("expression matrix is empty".into()));
        }
        let missing: Vec<&str> = expression
            .samples()
            .iter()
            .filter(|s| !clinical.contains(s.as_str()))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(LinchpinError::InputValidation(format!(
                "{} expression samples have no clinical record (first: {})",
                missing.len(),
                missing[0]
            )));
        }

        let before = mutations.len();
        let mut kept = Vec::with_capacity(before);
        for m in mutations {
            if clinical.contains(&m.sample_id) {
                kept.push(m);
            } else {
                flags.push(
                    DataQualityFlag::new(
                        Stage::Input,
                        QualityKind::UnknownSample,
                        format!("mutation in unknown sample {} dropped", m.sample_id),
                    )
                    .for_gene(m.gene),
                );
            }
        }
        if kept.len() < before {
            warn!(dropped = before - kept.len(), "Dropped mutations of unknown samples");
        }

        Ok(Self {
            expression,
            clinical,
            mutations: kept,
            compartments,
            druggable,
            regulators,
            flags,
        })
    }
}

/// Read every table named in `paths` and validate them together.
pub fn load_inputs(paths: &InputPaths) -> Result<InputBundle> {
    let mut flags = Vec::new();

    let expression = readers::read_expression(&paths.expression)?;
    flags.extend(expression.flags);
    let clinical = readers::read_clinical(&paths.clinical)?;
    flags.extend(clinical.flags);

    let mutations = match &paths.mutations {
        Some(p) => {
            let loaded = readers::read_mutations(p)?;
            flags.extend(loaded.flags);
            loaded.value
        }
        None => Vec::new(),
    };
    let compartments = match &paths.compartments {
        Some(p) => {
            let loaded = readers::read_compartments(p)?;
            flags.extend(loaded.flags);
            loaded.value
        }
        None => reference::default_compartments()?,
    };
    let druggable = match &paths.druggable {
        Some(p) => {
            let loaded = readers::read_druggable(p)?;
            flags.extend(loaded.flags);
            loaded.value
        }
        None => DruggableTargets::builtin(),
    };
    let regulators = match &paths.regulators {
        Some(p) => {
            let loaded = readers::read_regulators(p)?;
            flags.extend(loaded.flags);
            loaded.value
        }
        None => RegulatorReference::builtin(),
    };

    let bundle = InputBundle::validated(
        expression.value,
        clinical.value,
        mutations,
        compartments,
        druggable,
        regulators,
        flags,
    )?;
    info!(
        genes = bundle.expression.n_genes(),
        samples = bundle.expression.n_samples(),
        mutations = bundle.mutations.len(),
        flags = bundle.flags.len(),
        "Inputs validated"
    );
    Ok(bundle)
}
